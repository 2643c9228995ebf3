//! Uses the single integration test approach.
//!
//! This improves parallelism when running the tests, and reduces the number of binaries that have to be built (and linked)
#![cfg(unix)]
#![expect(
    clippy::tests_outside_test_module,
    reason = "This is the integration test binary, so it's expected that tests are outside of a test module"
)]
#![expect(clippy::unwrap_used, reason = "Using unwrap in tests is fine")]

extern crate alloc;
extern crate core;

mod broker_lifecycle;
mod common;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use common::{TestDir, spawn_controller, wait_for_listening};

#[tokio::test]
async fn first_run_shows_placeholders() {
    let dir = TestDir::new("first_run");
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;

    let status: Value = Client::new()
        .get(dir.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status["address"], "Not configured yet");
    assert_eq!(status["configured"], false);
    assert_eq!(status["action"], "undefined");
    assert!(
        !dir.settings_path().exists(),
        "first run must not write settings"
    );
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let dir = TestDir::new("not_found");
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;

    let res = Client::new()
        .get(dir.url("/api/nope"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
