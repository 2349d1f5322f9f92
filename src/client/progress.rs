//! Progress callback trait for interface-agnostic login updates
//!
//! The login flows report what they are doing through this trait so the CLI
//! can render spinners while tests stay silent.

use crate::error::Error;
use crate::types::DeliveryMode;
use async_trait::async_trait;
use url::Url;

/// Progress callback trait
#[async_trait]
pub trait LoginProgress: Send + Sync {
    /// Called once the login has been started with the backend
    async fn on_started(&self, mode: DeliveryMode);

    /// Called with the URL the user has to open; `opened` is false when the
    /// browser could not be launched (or launching was disabled)
    async fn on_browser(&self, url: &Url, opened: bool);

    /// Called while waiting for the browser side to finish
    async fn on_waiting(&self);

    /// Called when a token has been received
    async fn on_complete(&self);

    /// Called when an error occurs (non-fatal)
    async fn on_error(&self, error: &Error);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl LoginProgress for NoopProgress {
    async fn on_started(&self, _mode: DeliveryMode) {}
    async fn on_browser(&self, _url: &Url, _opened: bool) {}
    async fn on_waiting(&self) {}
    async fn on_complete(&self) {}
    async fn on_error(&self, _error: &Error) {}
}
