#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = flashcard_rust::run().await {
        eprintln!("flashcard-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
