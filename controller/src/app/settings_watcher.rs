//! Watches the settings file and queues a `resume` checkpoint when it changes.
//!
//! The controller writes the file itself during synchronization. Those writes only happen when a
//! value actually changed, so the resulting `resume` settles after one extra pass.

use core::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{OptionExt as _, WrapErr as _};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::{sync::mpsc::unbounded_channel, time::sleep};
use tracing::{debug, error, info};

use super::state::AppState;
use crate::sync::Checkpoint;

/// Bursts of events closer together than this count as one change.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Whether any path of `event` refers to the settings file.
///
/// Atomic replacement reports the temporary sibling and the final name, so the file name is
/// matched as a fallback to exact and canonical comparison.
fn touches_settings(event: &Event, path: &Path) -> bool {
    let Some(settings_filename) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|event_path| {
        if event_path == path {
            return true;
        }
        if let (Ok(canonical_event), Ok(canonical_settings)) =
            (fs::canonicalize(event_path), fs::canonicalize(path))
            && canonical_event == canonical_settings
        {
            return true;
        }
        event_path
            .file_name()
            .is_some_and(|name| name == settings_filename)
    })
}

/// Watches `path` until the checkpoint queue closes.
///
/// # Errors
///
/// Returns an error if the watcher cannot be set up.
pub(super) async fn watch_settings_file(path: PathBuf, state: &AppState) -> eyre::Result<()> {
    let (raw_tx, mut raw_rx) = unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res
                && raw_tx.send(event).is_err()
            {
                error!("Failed to send event to settings watcher channel");
            }
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create settings file watcher")?;

    let dir = path
        .parent()
        .ok_or_eyre("Settings file must have a parent directory")?;
    fs::create_dir_all(dir).wrap_err(format!(
        "Failed to create settings directory at: {}",
        dir.display()
    ))?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .wrap_err(format!("Failed to watch settings directory: {}", dir.display()))?;
    info!(path = %path.display(), "Watching settings file");

    while let Some(event) = raw_rx.recv().await {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
            || !touches_settings(&event, &path)
        {
            continue;
        }

        sleep(DEBOUNCE).await;
        while raw_rx.try_recv().is_ok() {}

        debug!("Settings file changed");
        if !state.enqueue(Checkpoint::Resume) {
            break;
        }
    }
    Ok(())
}
