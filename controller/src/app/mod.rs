//! The control service: shared state, background tasks and startup.

mod runtime;
mod settings_watcher;
mod startup;
pub(crate) mod state;

pub(crate) use startup::start;
pub(crate) use state::AppState;
