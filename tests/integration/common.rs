//! Common utilities for integration tests.
//!
//! Each test gets its own directory with a controller config, a settings file and a broker command
//! that records the configuration path it was handed.

use core::{
    sync::atomic::{AtomicU16, Ordering},
    time::Duration,
};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Parser as _;
use tokio::{net::TcpStream, task, time};

use brokerctl_controller::cli::Cli;

static NEXT_PORT: AtomicU16 = AtomicU16::new(17000);

pub(crate) fn get_free_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Guard that aborts the controller task when dropped.
pub(crate) struct KillOnDrop(pub task::JoinHandle<()>);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Files of one test run.
pub(crate) struct TestDir {
    pub root: PathBuf,
    pub port: u16,
}

impl TestDir {
    /// Creates a fresh directory holding a controller config whose broker writes its config path
    /// to [`Self::marker`] and then idles.
    pub(crate) fn new(name: &str) -> Self {
        let port = get_free_port();
        let root = env::temp_dir()
            .join("brokerctl_integration")
            .join(format!("{name}_{port}"));
        drop(fs::remove_dir_all(&root));
        fs::create_dir_all(&root).unwrap();
        let root = fs::canonicalize(&root).unwrap();

        let dir = Self { root, port };
        let config = format!(
            r#"
            [server]
            port = {port}
            bind = "127.0.0.1"

            [broker]
            command = '''echo "$BROKERCTL_BROKER_CONFIG" > "{marker}" && sleep 5'''
            "#,
            marker = dir.marker().display(),
        );
        fs::write(dir.config_path(), config).unwrap();
        dir
    }

    pub(crate) fn config_path(&self) -> PathBuf {
        self.root.join("brokerctl.toml")
    }

    pub(crate) fn settings_path(&self) -> PathBuf {
        self.root.join("settings.toml")
    }

    pub(crate) fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub(crate) fn marker(&self) -> PathBuf {
        self.root.join("broker_started")
    }

    pub(crate) fn write_settings(&self, toml: &str) {
        fs::write(self.settings_path(), toml).unwrap();
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }
}

/// Runs the control service in-process for the given directory.
pub(crate) fn spawn_controller(dir: &TestDir) -> KillOnDrop {
    let config_path = dir.config_path();
    let cli = Cli::parse_from([
        "brokerctl",
        "control-service",
        "--config",
        config_path.to_str().unwrap(),
    ]);
    let handle = tokio::spawn(async move {
        // SAFETY: Only used in integration tests. It just tells the controller to log less.
        unsafe {
            env::set_var("BROKERCTL_INTEGRATION_TEST", "1");
        }
        brokerctl_controller::inner_main(cli)
            .await
            .expect("inner_main failed");
    });
    KillOnDrop(handle)
}

/// Block until a TCP listener is accepting on `127.0.0.1:port` or timeout.
pub(crate) async fn wait_for_listening(port: u16, timeout_secs: u64) {
    let start = Instant::now();
    while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "server did not start within timeout"
        );
        time::sleep(Duration::from_millis(100)).await;
    }
}

/// Block until `path` exists with non-empty content, then return it.
pub(crate) async fn wait_for_content(path: &Path, timeout_secs: u64) -> String {
    let start = Instant::now();
    loop {
        if let Ok(content) = fs::read_to_string(path)
            && !content.trim().is_empty()
        {
            return content;
        }
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "{} was not written within timeout",
            path.display()
        );
        time::sleep(Duration::from_millis(50)).await;
    }
}
