use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::core::security;
use crate::repositories;
use crate::test_support::{self, TestContext};

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
    let body = if status == StatusCode::NO_CONTENT {
        Value::Null
    } else {
        test_support::read_json(response).await
    };
    (status, body)
}

async fn import(ctx: &TestContext, token: &str, fields: &[(&str, &str)], csv: &str) -> (StatusCode, Value) {
    let uri = test_support::api_path(ctx.state.settings(), "/admin/books/import");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::multipart_request(&uri, token, fields, "book.csv", csv.as_bytes()))
        .await
        .expect("import");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn students_cannot_reach_admin_routes() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_user(&ctx.state, "alice", "1234").await;
    let token = test_support::bearer_token("alice", ctx.state.settings());

    let (status, _) = send(&ctx, Method::GET, "/admin/users", &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_student_accounts() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_admin(&ctx.state, "teacher", "admin-pass").await;
    let token = test_support::bearer_token("teacher", ctx.state.settings());

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/admin/users",
        &token,
        Some(json!({"name": "alice", "student_id": "S-100", "password": "1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["name"], "alice");
    assert_eq!(body["student_id"], "S-100");
    assert_eq!(body["color"], "#1E90FF");
    assert_eq!(body["is_admin"], false);

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/admin/users",
        &token,
        Some(json!({"name": "bad/name", "password": "1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/admin/users",
        &token,
        Some(json!({"name": "bob", "password": "12"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &ctx,
        Method::PATCH,
        "/admin/users/alice",
        &token,
        Some(json!({"color": "#FF0000", "password": "5678"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["color"], "#FF0000");
    assert_eq!(body["student_id"], "S-100");
    let stored = repositories::users::find(ctx.state.store(), ctx.state.paths(), "alice")
        .await
        .unwrap()
        .expect("user");
    assert!(security::verify_password("5678", &stored.password_hash).unwrap());

    let (status, body) = send(&ctx, Method::GET, "/admin/users", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let (status, _) = send(&ctx, Method::DELETE, "/admin/users/teacher", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&ctx, Method::DELETE, "/admin/users/alice", &token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&ctx, Method::DELETE, "/admin/users/alice", &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_imports_and_edits_a_book() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_admin(&ctx.state, "teacher", "admin-pass").await;
    let token = test_support::bearer_token("teacher", ctx.state.settings());

    let csv = "Category,Template,Options,Order\n\
               Food,I like ___.,apples|bananas,1\n\
               Food,,rice,3\n\
               Travel,We go to ___.,school| the park ,x\n";
    let (status, body) =
        import(&ctx, &token, &[("dataset_id", "book1"), ("name", "Book One")], csv).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["imported"], 2);
    assert_eq!(body["skipped"], 1);

    let items = repositories::sentences::list_items(ctx.state.store(), ctx.state.paths(), "book1")
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].template, "I like ___.");
    assert_eq!(items[1].options, vec!["school".to_string(), "the park".to_string()]);

    let (status, body) = send(&ctx, Method::GET, "/admin/books/scopes", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["scopes"][0]["key"], r#"book:["book1"]"#);
    assert_eq!(body["scopes"][0]["label"], "Book One");
    assert_eq!(body["scopes"][2]["key"], r#"book:["book1","Travel"]"#);
    assert_eq!(body["scopes"][2]["scope"], r#"category:["Travel"]"#);

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/admin/books/book1/items/save",
        &token,
        Some(json!({"items": [
            {"doc_id": items[0].doc_id, "Category": "Food", "Template": "I love ___.", "Options": "apples|pears", "Order": 1},
            {"Category": "Food", "Template": "He drinks ___.", "Options": ["tea"]},
            {"Category": "Food", "Template": "  ", "Options": "x"}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body, json!({"updated": 1, "created": 1, "skipped": 1}));

    let (status, body) = send(
        &ctx,
        Method::GET,
        "/admin/books/book1/items",
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let templates: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["Template"].as_str().unwrap())
        .collect();
    assert_eq!(templates, vec!["I love ___.", "We go to ___.", "He drinks ___."]);

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/admin/books/book1/items/delete",
        &token,
        Some(json!({"doc_ids": [items[1].doc_id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["deleted"], 1);
    let remaining = repositories::sentences::list_items(ctx.state.store(), ctx.state.paths(), "book1")
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn imports_reject_missing_columns_before_writing() {
    let ctx = test_support::setup_test_context().await;
    test_support::insert_admin(&ctx.state, "teacher", "admin-pass").await;
    let token = test_support::bearer_token("teacher", ctx.state.settings());

    let (status, body) =
        import(&ctx, &token, &[("dataset_id", "book2")], "Category,Template\nFood,x\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Options"));
    assert!(repositories::sentences::find_catalog_entry(ctx.state.store(), ctx.state.paths(), "book2")
        .await
        .unwrap()
        .is_none());

    let (status, _) = import(&ctx, &token, &[("dataset_id", "a.b")], "Category,Template,Options\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = import(&ctx, &token, &[], "Category,Template,Options\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
