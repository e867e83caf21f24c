use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::db::models::SentenceItem;
use crate::repositories;
use crate::test_support::{self, TestContext};

fn options(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Book `book1` with two categories; returns the stored items in order.
async fn seed_book(ctx: &TestContext) -> Vec<SentenceItem> {
    let store = ctx.state.store();
    let paths = ctx.state.paths();
    repositories::sentences::upsert_catalog_entry(store, paths, "book1", "Book One").await.unwrap();
    repositories::sentences::save_items(
        store,
        paths,
        "book1",
        vec![
            SentenceItem::new("Food", "I like ___.", options(&["apples", "bananas", "pears"]), 1),
            SentenceItem::new("Food", "She eats ___.", options(&["rice"]), 2),
            SentenceItem::new("Travel", "We go to ___.", options(&["school", "the park"]), 3),
        ],
    )
    .await
    .unwrap();
    repositories::sentences::list_items(store, paths, "book1").await.unwrap()
}

async fn send(
    ctx: &TestContext,
    method: Method,
    path: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let uri = test_support::api_path(ctx.state.settings(), path);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, &uri, Some(token), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn progress_merges_and_refreshes_the_dataset_stat() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    let items = seed_book(&ctx).await;
    let token = test_support::bearer_token("alice", ctx.state.settings());
    let path = format!("/sentences/books/book1/items/{}/progress", items[0].doc_id);

    let (status, body) =
        send(&ctx, Method::POST, &path, &token, Some(json!({"confirmed_options": ["apples", "kiwis"]})))
            .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["completed_options"], json!(["apples"]));
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["stats_refreshed"], true);
    assert_eq!(body["dataset_stat"]["in_progress_count"], 1);
    assert_eq!(body["dataset_stat"]["total_count"], 3);

    let (_, body) = send(
        &ctx,
        Method::POST,
        &path,
        &token,
        Some(json!({"confirmed_options": ["bananas", "pears", "apples"]})),
    )
    .await;
    assert_eq!(body["status"], "done");
    assert_eq!(body["newly_completed"], json!(["bananas", "pears"]));
    assert_eq!(body["dataset_stat"]["completed_count"], 1);
    assert_eq!(body["dataset_stat"]["in_progress_count"], 0);

    let user = repositories::users::find(ctx.state.store(), ctx.state.paths(), "alice")
        .await
        .unwrap()
        .expect("user");
    let stat = user.sentence_stats.get("book1").expect("stat");
    assert_eq!(stat.dataset_name, "Book One");
    assert_eq!(stat.completed_count, 1);
    assert!(stat.last_active.is_some());

    let (status, body) = send(&ctx, Method::GET, "/sentences/books", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["books"][0]["id"], "book1");
    assert_eq!(body["books"][0]["stat"]["completed_count"], 1);
    let done = body["books"][0]["fractions"]["done"].as_f64().unwrap();
    assert!((done - 1.0 / 3.0).abs() < 1e-9);

    let (status, _) =
        send(&ctx, Method::POST, &path, &token, Some(json!({"confirmed_options": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn items_report_status_per_sentence() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    let items = seed_book(&ctx).await;
    let token = test_support::bearer_token("alice", ctx.state.settings());
    send(
        &ctx,
        Method::POST,
        &format!("/sentences/books/book1/items/{}/progress", items[0].doc_id),
        &token,
        Some(json!({"confirmed_options": ["apples"]})),
    )
    .await;
    send(
        &ctx,
        Method::POST,
        &format!("/sentences/books/book1/items/{}/progress", items[1].doc_id),
        &token,
        Some(json!({"confirmed_options": ["rice"]})),
    )
    .await;

    let (status, body) = send(&ctx, Method::GET, "/sentences/books/book1/items", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["scope"], "book");
    let statuses: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["in_progress", "done", "not_started"]);
    assert_eq!(body["items"][0]["Template"], "I like ___.");
    assert_eq!(body["items"][0]["completed_options"], json!(["apples"]));

    let (_, scopes) = send(&ctx, Method::GET, "/sentences/books/book1/scopes", &token, None).await;
    let travel = scopes["scopes"][2]["key"].as_str().unwrap().to_string();
    assert_eq!(travel, r#"category:["Travel"]"#);

    let (_, summary) = send(&ctx, Method::GET, "/sentences/books/book1/summary", &token, None).await;
    assert_eq!(summary["name"], "Book One");
    assert_eq!(summary["rollup"]["completed_count"], 1);
    assert_eq!(summary["rollup"]["in_progress_count"], 1);
    assert_eq!(summary["categories"][0]["category"], "Food");
    assert_eq!(summary["categories"][1]["rollup"]["completed_count"], 0);
    assert_eq!(summary["categories"][1]["fractions"]["remaining"], 1.0);
}

#[tokio::test]
async fn attempts_fall_back_to_the_client_transcript() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    let items = seed_book(&ctx).await;
    let token = test_support::bearer_token("alice", ctx.state.settings());
    let path = format!("/sentences/books/book1/items/{}/attempt", items[0].doc_id);

    let (status, body) = send(
        &ctx,
        Method::POST,
        &path,
        &token,
        Some(json!({
            "audio_base64": "AAAA",
            "mime_type": "audio/webm",
            "transcript": "I like apples and Bananas"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["recognition"]["source"], "secondary");
    assert_eq!(body["recognition"]["correct_options"], json!(["apples", "bananas"]));
    assert_eq!(body["progress"]["status"], "in_progress");

    let (status, body) =
        send(&ctx, Method::POST, &path, &token, Some(json!({"transcript": "nothing here"}))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["progress"].is_null());

    let (status, _) = send(&ctx, Method::POST, &path, &token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&ctx, Method::POST, &path, &token, Some(json!({"audio_base64": "%%%"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_books_and_reserved_ids_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    seed_book(&ctx).await;
    let token = test_support::bearer_token("alice", ctx.state.settings());

    let (status, _) = send(&ctx, Method::GET, "/sentences/books/nope/items", &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&ctx, Method::GET, "/sentences/books/users/items", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/sentences/books/book1/items/missing/progress",
        &token,
        Some(json!({"confirmed_options": ["rice"]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Sentence missing in book book1: not found");
}

#[tokio::test]
async fn leaderboard_ranks_every_user() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    test_support::insert_user(&ctx.state, "bob", "1234").await;
    let items = seed_book(&ctx).await;
    let token = test_support::bearer_token("bob", ctx.state.settings());
    send(
        &ctx,
        Method::POST,
        &format!("/sentences/books/book1/items/{}/progress", items[1].doc_id),
        &token,
        Some(json!({"confirmed_options": ["rice"]})),
    )
    .await;

    let (status, body) = send(&ctx, Method::GET, "/leaderboard/book1", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["name"], "Book One");
    assert_eq!(body["entries"][0]["name"], "bob");
    assert_eq!(body["entries"][0]["completed_count"], 1);
    assert_eq!(body["entries"][1]["name"], "alice");
    assert_eq!(body["entries"][1]["completed_count"], 0);
    assert!(body["entries"][1]["fractions"].is_null());
}
