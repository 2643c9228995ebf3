//! Credential provisioning: turns a plaintext password into the broker's `username:sha256hex` file.

use std::{
    fs, io,
    path::{self, PathBuf},
};

use brokerctl_common::credential_line;
use secrecy::SecretString;
use tracing::{debug, error};

use crate::{error::Fault, persist::write_atomically};

/// Name of the credential file inside the data directory.
pub const CREDENTIAL_FILE_NAME: &str = "password.conf";

/// Writes the credential file consumed by the broker collaborator.
///
/// The file lives in the controller's private data directory and is overwritten on every
/// successful call. It is never read back.
#[derive(Debug, Clone)]
pub struct CredentialProvisioner {
    dir: PathBuf,
}

impl CredentialProvisioner {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the credential file is (or will be) written.
    #[must_use]
    pub fn credential_path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE_NAME)
    }

    /// Writes `username:sha256hex(password)` and returns the file's absolute path.
    ///
    /// # Errors
    ///
    /// - [`Fault::CredentialUnavailable`] if `password` is `None`; nothing is written.
    /// - [`Fault::InvalidUsername`] if `username` would break the one-line record; nothing is written.
    /// - [`Fault::CredentialWriteFailed`] on any I/O fault; the previous file, if any, is left intact.
    #[tracing::instrument(skip(self, password), fields(path = %self.credential_path().display()))]
    pub fn provision(
        &self,
        username: &str,
        password: Option<&SecretString>,
    ) -> Result<PathBuf, Fault> {
        let Some(password) = password else {
            error!("No password available, credential file not written");
            return Err(Fault::CredentialUnavailable);
        };

        if !is_valid_username(username) {
            error!(username, "Username cannot be stored in the credential file");
            return Err(Fault::InvalidUsername(username.to_owned()));
        }

        let path = self.credential_path();
        let line = credential_line(username, password);

        self.write(&path, &line).map_err(|source| {
            error!(?source, "Failed to write credential file");
            Fault::CredentialWriteFailed {
                path: path.clone(),
                source,
            }
        })?;

        let absolute = path::absolute(&path).map_err(|source| Fault::CredentialWriteFailed {
            path: path.clone(),
            source,
        })?;
        debug!("Credential file written");
        Ok(absolute)
    }

    fn write(&self, path: &path::Path, line: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_atomically(path, line.as_bytes(), true)
    }
}

/// The record is `username:digest` on a single line, so the name can carry neither.
fn is_valid_username(username: &str) -> bool {
    !username.contains([':', '\n', '\r'])
}

#[cfg(test)]
mod tests {
    use std::env;

    use brokerctl_common::{SHA256_HEX_LEN, sha256_hex};

    use super::*;

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join("brokerctl_credentials").join(name);
        drop(fs::remove_dir_all(&dir));
        dir
    }

    #[test]
    fn writes_username_and_digest() {
        let provisioner = CredentialProvisioner::new(fresh_dir("write"));
        let path = provisioner
            .provision("alice", Some(&SecretString::from("s3cret")))
            .unwrap();

        assert!(path.is_absolute(), "returned path must be absolute");
        let content = fs::read_to_string(&path).unwrap();
        let (user, digest) = content.split_once(':').unwrap();
        assert_eq!(user, "alice");
        assert_eq!(digest.len(), SHA256_HEX_LEN);
        assert_eq!(digest, sha256_hex("s3cret"));
    }

    #[test]
    fn missing_password_writes_nothing() {
        let dir = fresh_dir("missing");
        let provisioner = CredentialProvisioner::new(&dir);

        let res = provisioner.provision("alice", None);

        assert!(matches!(res, Err(Fault::CredentialUnavailable)));
        assert!(!provisioner.credential_path().exists());
    }

    #[test]
    fn missing_password_leaves_existing_file_alone() {
        let provisioner = CredentialProvisioner::new(fresh_dir("keep"));
        provisioner
            .provision("alice", Some(&SecretString::from("first")))
            .unwrap();
        let before = fs::read(provisioner.credential_path()).unwrap();

        drop(provisioner.provision("alice", None));

        assert_eq!(fs::read(provisioner.credential_path()).unwrap(), before);
    }

    #[test]
    fn username_with_colon_is_rejected() {
        let provisioner = CredentialProvisioner::new(fresh_dir("colon"));

        let res = provisioner.provision("ad:min", Some(&SecretString::from("pw")));

        assert!(
            matches!(res, Err(Fault::InvalidUsername(ref name)) if name == "ad:min"),
            "got {res:?}"
        );
        assert!(!provisioner.credential_path().exists());
    }

    #[test]
    fn username_with_line_break_is_rejected() {
        let provisioner = CredentialProvisioner::new(fresh_dir("newline"));
        provisioner
            .provision("alice", Some(&SecretString::from("first")))
            .unwrap();
        let before = fs::read(provisioner.credential_path()).unwrap();

        let res = provisioner.provision("admin\nroot", Some(&SecretString::from("pw")));

        assert!(matches!(res, Err(Fault::InvalidUsername(_))), "got {res:?}");
        assert_eq!(fs::read(provisioner.credential_path()).unwrap(), before);
    }

    #[test]
    fn provisioning_twice_is_byte_identical() {
        let provisioner = CredentialProvisioner::new(fresh_dir("twice"));
        let password = SecretString::from("password");

        let first_path = provisioner.provision("admin", Some(&password)).unwrap();
        let first = fs::read(&first_path).unwrap();
        let second_path = provisioner.provision("admin", Some(&password)).unwrap();
        let second = fs::read(&second_path).unwrap();

        assert_eq!(first_path, second_path);
        assert_eq!(first, second, "file must be overwritten, not appended");
    }

    #[test]
    fn unwritable_directory_is_a_write_fault() {
        let base = fresh_dir("unwritable");
        fs::create_dir_all(&base).unwrap();
        // A regular file where the data directory should be.
        let blocker = base.join("data");
        fs::write(&blocker, "not a directory").unwrap();

        let res = CredentialProvisioner::new(&blocker)
            .provision("alice", Some(&SecretString::from("pw")));

        assert!(
            matches!(res, Err(Fault::CredentialWriteFailed { .. })),
            "expected write failure, got {res:?}"
        );
    }
}
