//! Shared test helpers

pub mod fixtures;
pub mod live_server;
