use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("vocabulary_answers_total", "Practice answers judged, by outcome");
    metrics::describe_counter!("sentence_attempts_total", "Recognized sentence attempts");
    metrics::describe_counter!("store_batch_commits_total", "Chunked batch commits");
    metrics::describe_counter!("auth_logins_total", "Login attempts, by outcome");
    metrics::describe_counter!("ai_requests_total", "Generative service calls, by outcome");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
