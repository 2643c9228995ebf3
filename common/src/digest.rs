//! One-way digest helpers for the broker credential file.
//!
//! The broker collaborator authenticates against lines of the form
//! `username:sha256hex`, so the digest here must stay SHA-256, lowercase hex.

use secrecy::{ExposeSecret as _, SecretString};
use sha2::{Digest as _, Sha256};

/// Length of a hex encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Hashes `input` with SHA-256 and returns the lowercase hex encoding.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Builds a single credential record: `username:sha256hex(password)`.
///
/// No trailing newline is appended.
#[must_use]
pub fn credential_line(username: &str, password: &SecretString) -> String {
    format!("{username}:{}", sha256_hex(password.expose_secret()))
}
