//! Integration tests for the HTTP API

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use helpers::{token_auth_config, TEST_TOKEN};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tagsync_common::config::TomlConfig;
use tagsync_common::db::init_memory_database;
use tower::util::ServiceExt;

/// Test helper: router over an in-memory database with one config token
async fn create_test_app() -> Router {
    let db = init_memory_database().await.expect("memory database");
    let config = TomlConfig {
        auth: token_auth_config(),
        ..TomlConfig::default()
    };
    tagsync_server::build_router(tagsync_server::AppState::new(db, &config))
}

fn authorized(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn import(app: &Router, uri: &str, body: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            authorized(Request::builder().method("POST").uri(uri))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tagsync-server");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/projects/1/tags")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/projects/1/tags")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            authorized(Request::builder().uri("/api/projects/1/tags"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_import_then_list() {
    let app = create_test_app().await;
    let csv = "name,type,address\nMotor_Output,BOOL,O:2/0\nMotor_Output,BOOL,O:2/1\n";

    let response = import(&app, "/api/projects/9/import?vendor=rockwell", csv).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["insertedCount"], 1);
    assert_eq!(body["updatedCount"], 1);
    assert_eq!(body["errors"][0]["code"], "duplicate_name");

    let response = app
        .oneshot(
            authorized(Request::builder().uri("/api/projects/9/tags"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let tags = body_json(response).await;
    assert_eq!(tags.as_array().unwrap().len(), 1);
    assert_eq!(tags[0]["name"], "Motor_Output");
    assert_eq!(tags[0]["address"], "O:2/1");
    assert_eq!(tags[0]["projectId"], 9);
}

#[tokio::test]
async fn test_malformed_import_is_bad_request() {
    let app = create_test_app().await;

    let response = import(
        &app,
        "/api/projects/1/import?vendor=siemens&format=xml",
        "<Document><Engineering version=\"V17\"/>",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "MALFORMED_CONTAINER");
    assert_eq!(body["error"]["diagnostic"]["code"], "unparseable");

    let response = import(&app, "/api/projects/1/import?vendor=omron", "name,type\nA,BOOL\n").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_headers() {
    let app = create_test_app().await;
    import(
        &app,
        "/api/projects/4/import?vendor=rockwell",
        "name,type,address,usage\nStart_Button,BOOL,I:0/0,Input\nDelay,TIMER,T4:0,Local\n",
    )
    .await;

    let response = app
        .oneshot(
            authorized(Request::builder().uri("/api/projects/4/export?vendor=beckhoff&format=xml"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/xml");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"project-4-beckhoff-tags.xml\""
    );
    assert_eq!(headers["x-skipped-tags"], "1");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("Start_Button"));
    assert!(text.contains("%IX0.0"));
}

#[tokio::test]
async fn test_validate_address() {
    let app = create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            authorized(Request::builder().uri("/api/address/validate?vendor=siemens&address=%25a0.1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["vendor"], "siemens");
    assert_eq!(body["normalized"], "Q0.1");

    let response = app
        .oneshot(
            authorized(Request::builder().uri("/api/address/validate?vendor=beckhoff&address=%25IX0.9"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_translate_tag() {
    let app = create_test_app().await;
    let request = json!({
        "tag": {
            "name": "Start_Button",
            "dataType": "bool",
            "address": "I:0/0",
            "scope": "input",
            "category": "input",
            "vendor": "rockwell"
        },
        "targetVendor": "beckhoff"
    });

    let response = app
        .clone()
        .oneshot(
            authorized(Request::builder().method("POST").uri("/api/translate"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["vendor"], "beckhoff");
    assert_eq!(body["address"], "%IX0.0");
    assert_eq!(body["dataType"], "BOOL");

    let request = json!({
        "tag": {
            "name": "Delay",
            "dataType": "timer",
            "address": "T4:0",
            "scope": "local",
            "category": "memory",
            "vendor": "rockwell"
        },
        "targetVendor": "siemens"
    });
    let response = app
        .oneshot(
            authorized(Request::builder().method("POST").uri("/api/translate"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
