//! Crash-safe file replacement shared by the settings store and the credential provisioner.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{self, Write as _},
    path::{Path, PathBuf},
};

/// Replaces `path` with `contents` without ever exposing a partially written file.
///
/// The bytes go to a sibling temp file which is synced and closed before being renamed over `path`.
/// On failure the temp file is removed and `path` keeps its previous contents.
/// With `private` set the file is created owner-only on unix.
pub(crate) fn write_atomically(path: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    let tmp = temp_sibling(path);
    let result = write_then_rename(&tmp, path, contents, private);
    if result.is_err() {
        // Best effort; the original error is what matters.
        drop(fs::remove_file(&tmp));
    }
    result
}

fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}
