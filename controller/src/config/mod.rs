//! Controller configuration: the TOML file naming the API listener, storage paths and broker command.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
