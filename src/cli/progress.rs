//! CLI login progress with styled output and a wait spinner

use crate::cli::style::{Stream, Stylize, arrow, check, hyperlink_url, spinner};
use anstream::{eprintln, println};
use async_trait::async_trait;
use cli_handoff::client::LoginProgress;
use cli_handoff::error::Error;
use cli_handoff::types::DeliveryMode;
use indicatif::ProgressBar;
use std::sync::Mutex;
use url::Url;

/// Prints login progress; shows a spinner while waiting for the browser
#[derive(Default)]
pub struct CliProgress {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    fn finish_spinner(&self) {
        let mut slot = self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.finish_spinner();
    }
}

#[async_trait]
impl LoginProgress for CliProgress {
    async fn on_started(&self, mode: DeliveryMode) {
        println!("Starting {} login...", mode.to_string().emphasis());
    }

    async fn on_browser(&self, url: &Url, opened: bool) {
        if opened {
            println!("{} Opened your browser. If it did not open, visit:", arrow());
        } else {
            println!("{} Open this URL in your browser:", arrow());
        }
        println!("  {}", hyperlink_url(Stream::Stdout, url.as_str()).accent());
    }

    async fn on_waiting(&self) {
        let bar = spinner("Waiting for the browser to finish signing in...");
        *self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(bar);
    }

    async fn on_complete(&self) {
        self.finish_spinner();
        println!("{} Received token", check());
    }

    async fn on_error(&self, err: &Error) {
        let slot = self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match slot.as_ref() {
            Some(bar) => bar.suspend(|| eprintln!("{}: {}", "warning".warn(), err)),
            None => eprintln!("{}: {}", "warning".warn(), err),
        }
    }
}
