//! Local control API: status, broker start/stop/probe and on-demand checkpoints.

pub mod api;
mod middleware;
pub mod router;
