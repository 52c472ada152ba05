//! Shared test helpers: app state over a test store, and request builders.

pub mod store;

#[allow(unused_imports)]
pub use store::*;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use content_relay::config::{Config, GitHubConfig, PublishConfig, ServerConfig};
use content_relay::content_store::ContentStore;
use content_relay::retry::RetryPolicy;
use content_relay::rotator::TokenRotator;
use content_relay::staging::Staging;
use content_relay::AppState;
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "relay-test-boundary";

/// Create a test AppState with a temporary staging directory and the given store.
#[allow(dead_code)]
pub fn test_state(temp_dir: &tempfile::TempDir, store: Arc<dyn ContentStore>) -> Arc<AppState> {
    test_state_with(temp_dir, store, |_| {})
}

/// Like [`test_state`], with a chance to adjust the configuration first.
pub fn test_state_with<F>(
    temp_dir: &tempfile::TempDir,
    store: Arc<dyn ContentStore>,
    configure: F,
) -> Arc<AppState>
where
    F: FnOnce(&mut Config),
{
    let staging_dir = temp_dir.path().join("staging");

    let mut config = Config {
        github: GitHubConfig {
            owner: "octo".to_string(),
            repo: "cdn".to_string(),
            tokens: vec!["t0".to_string(), "t1".to_string()],
            ..Default::default()
        },
        publish: PublishConfig {
            base_url: "https://cdn.example.test/cdn1".to_string(),
            custom_url: "https://cdn.example.test/aura".to_string(),
            ..Default::default()
        },
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            staging_dir: staging_dir.to_string_lossy().to_string(),
        },
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        },
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
    };
    configure(&mut config);

    let staging = Staging::new(&staging_dir).expect("Failed to create test staging directory");
    let rotator = TokenRotator::new(config.github.tokens.clone());

    Arc::new(AppState {
        config,
        content_store: store,
        rotator,
        staging,
    })
}

#[allow(dead_code)]
pub fn upload_request(
    uri: &str,
    field: &str,
    file_name: Option<&str>,
    data: &str,
) -> Request<Body> {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\n\
         Content-Type: application/octet-stream\r\n\r\n{data}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[allow(dead_code)]
pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a request through the router and decode the JSON body (Null when not JSON).
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[allow(dead_code)]
pub fn staging_is_empty(state: &AppState) -> bool {
    std::fs::read_dir(state.staging.root()).unwrap().count() == 0
}
