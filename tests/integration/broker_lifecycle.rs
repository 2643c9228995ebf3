//! Start/stop through the control API against a real supervised broker process.

use core::time::Duration;
use std::fs;

use brokerctl_common::{BrokerConfiguration, sha256_hex};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time;

use crate::common::{TestDir, spawn_controller, wait_for_content, wait_for_listening};

#[tokio::test]
async fn start_hands_broker_its_configuration() {
    let dir = TestDir::new("start");
    dir.write_settings(
        r#"
        configured = "true"
        password = "hunter2"
        port = "1883"
        "netty.mqtt.message_size" = "1024"
        "#,
    );
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;

    let res = Client::new()
        .post(dir.url("/api/broker/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let config_path = wait_for_content(&dir.marker(), 5).await;
    let payload = fs::read_to_string(config_path.trim()).unwrap();
    let config: BrokerConfiguration = serde_json::from_str(&payload).unwrap();
    assert_eq!(config.port, "1883");
    assert_eq!(config.max_message_bytes, "1024");
    assert_eq!(config.websocket_port, 8080);
    assert!(config.auth_required);

    let credentials = fs::read_to_string(&config.password_file_path).unwrap();
    assert_eq!(credentials, format!("admin:{}", sha256_hex("hunter2")));
    assert!(
        config
            .password_file_path
            .starts_with(dir.data_dir().to_str().unwrap()),
        "credentials must live in the data dir, got {}",
        config.password_file_path
    );
}

#[tokio::test]
async fn start_without_password_is_rejected() {
    let dir = TestDir::new("no_password");
    dir.write_settings(
        r#"
        configured = "true"
        port = "1883"
        "#,
    );
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;

    let res = Client::new()
        .post(dir.url("/api/broker/start"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("No password"));
    assert!(!dir.data_dir().join("password.conf").exists());
    assert!(!dir.marker().exists());
}

#[tokio::test]
async fn stop_after_start_reports_stopped() {
    let dir = TestDir::new("stop");
    dir.write_settings(
        r#"
        configured = "true"
        password = "pw"
        "#,
    );
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;
    let client = Client::new();

    let res = client.post(dir.url("/api/broker/start")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    wait_for_content(&dir.marker(), 5).await;

    let res = client.post(dir.url("/api/broker/stop")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let probe: Value = client
        .post(dir.url("/api/broker/probe"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(probe["alive"], false);

    let status: Value = client
        .get(dir.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["action"], "stopped");
    assert_eq!(status["connection"], "disconnected");
}

#[tokio::test]
async fn settings_edit_triggers_resume() {
    let dir = TestDir::new("resume");
    dir.write_settings(
        r#"
        configured = "true"
        port = "1883"
        "#,
    );
    let _guard = spawn_controller(&dir);
    wait_for_listening(dir.port, 5).await;
    let client = Client::new();
    // Give the watcher time to register before editing.
    time::sleep(Duration::from_millis(500)).await;

    dir.write_settings(
        r#"
        configured = "true"
        port = "1999"
        "#,
    );

    let mut port = Value::Null;
    for _ in 0..50 {
        let status: Value = client
            .get(dir.url("/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        port = status["port"].clone();
        if port == "1999" {
            break;
        }
        time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(port, "1999");
}
