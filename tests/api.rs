//! HTTP-layer integration tests: build a router against an in-memory
//! store and drive it with `tower::ServiceExt::oneshot`, the way the
//! teacher's own router tests do, checking status codes and envelope
//! shape rather than re-testing collector internals.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::{mpsc, RwLock};
use tower::ServiceExt;

use etlmon::api::{create_router, AppState};
use etlmon::config::{NodeConfig, NodeSettings, PathConfig};
use etlmon::manager::ScannerProxy;
use etlmon::storage::Store;

fn test_config() -> NodeConfig {
    NodeConfig {
        node: NodeSettings {
            listen: "127.0.0.1:0".to_string(),
            node_name: "test-node".to_string(),
            db_path: ":memory:".to_string(),
        },
        refresh: Default::default(),
        paths: vec![PathConfig {
            path: "/tmp".to_string(),
            scan_interval: Some(Duration::from_secs(3600)),
            max_depth: Some(1),
            exclude: vec![],
            timeout: Some(Duration::from_secs(5)),
        }],
        process: Default::default(),
        logs: vec![],
        aggregation: Default::default(),
    }
}

fn test_state() -> AppState {
    let (reload_tx, _reload_rx) = mpsc::channel(8);
    AppState {
        store: Arc::new(Store::open(":memory:").unwrap()),
        scanner: Arc::new(ScannerProxy::new()),
        config: Arc::new(RwLock::new(test_config())),
        config_path: Arc::new("/dev/null".to_string()),
        reload_tx,
        started_at: chrono::Utc::now(),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_status_and_node_name() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["node_name"], "test-node");
}

#[tokio::test]
async fn fs_list_is_empty_but_well_formed_on_a_fresh_store() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/fs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn paths_rejects_negative_pagination_params() {
    let app = create_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/paths?limit=-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn paths_without_query_params_omits_meta() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/paths").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("meta").is_none() || json["meta"].is_null());
}

#[tokio::test]
async fn paths_scan_with_empty_body_paths_is_bad_request() {
    let app = create_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/paths/scan")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"paths":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paths_scan_without_a_configured_scanner_is_not_implemented() {
    let app = create_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/paths/scan")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"paths":["/tmp"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn processes_list_is_empty_but_well_formed_on_a_fresh_store() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/processes").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn logs_rejects_non_positive_limit() {
    let app = create_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/logs?limit=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn log_files_lists_configured_logs_even_when_absent_on_disk() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/logs/files").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn get_config_roundtrips_the_node_name() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/config").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["node"]["node_name"], "test-node");
}

#[tokio::test]
async fn put_config_rejects_an_invalid_config() {
    let app = create_router(test_state());
    let invalid = serde_json::json!({
        "node": { "node_name": "", "listen": "0.0.0.0:8080", "db_path": ":memory:" },
        "paths": [],
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/config")
                .header("content-type", "application/json")
                .body(Body::from(invalid.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn put_config_with_malformed_json_body_is_bad_request() {
    // Wrong shape entirely (not just a failed validation rule) must still
    // map to 400 per spec.md §6, not axum's default 422 for extractor
    // rejections.
    let app = create_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/config")
                .header("content-type", "application/json")
                .body(Body::from("{ not valid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/v1/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
