//! Types and helpers shared between the broker controller and anything speaking to it.
//!
//! This crate provides:
//! - The command and configuration types that cross the broker process boundary
//! - The intent-tracking `ServiceAction` state
//! - The credential digest used for the broker's password file
#![cfg_attr(
    test,
    expect(
        clippy::unwrap_used,
        clippy::indexing_slicing,
        reason = "This is not problematic in tests"
    )
)]

extern crate core;

mod digest;
mod map_to_str;
mod protocol;

pub use digest::*;
pub use map_to_str::*;
pub use protocol::*;
