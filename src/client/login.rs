//! CLI login flows
//!
//! Both delivery strategies end the same way: a bearer token (plus the user
//! it belongs to, when the server will say) that the caller then stores.

use crate::client::api::HandoffClient;
use crate::client::listener::CallbackListener;
use crate::client::progress::LoginProgress;
use crate::error::{Error, Result};
use crate::token::TokenMinter;
use crate::types::{DeliveryMode, PollStatus, UserInfo};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Default time to wait for the browser side
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// How to run a login
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Delivery strategy
    pub mode: DeliveryMode,
    /// Give up after this long
    pub timeout: Duration,
    /// Launch the system browser (otherwise the URL is only reported)
    pub open_browser: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Loopback,
            timeout: DEFAULT_LOGIN_TIMEOUT,
            open_browser: true,
        }
    }
}

/// A finished login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Bearer token
    pub token: String,
    /// Token owner, if known
    pub user: Option<UserInfo>,
}

/// Run a login with the strategy chosen in `options`
pub async fn login(
    client: &HandoffClient,
    options: &LoginOptions,
    progress: &dyn LoginProgress,
) -> Result<LoginOutcome> {
    match options.mode {
        DeliveryMode::Loopback => login_loopback(client, options, progress).await,
        DeliveryMode::Poll => login_poll(client, options, progress).await,
    }
}

/// Loopback handoff: the backend redirects the browser to a local listener
pub async fn login_loopback(
    client: &HandoffClient,
    options: &LoginOptions,
    progress: &dyn LoginProgress,
) -> Result<LoginOutcome> {
    let listener = CallbackListener::bind().await?;
    let state = TokenMinter::os().generate();
    let url = client.login_url(&state, &listener.redirect_uri())?;
    debug!(port = listener.port(), "Starting loopback login");

    progress.on_started(DeliveryMode::Loopback).await;
    let opened = options.open_browser && open_browser(&url);
    progress.on_browser(&url, opened).await;
    progress.on_waiting().await;

    let token = listener.wait(&state, options.timeout).await?;
    progress.on_complete().await;

    let user = identify(client, &token, progress).await;
    Ok(LoginOutcome { token, user })
}

/// Poll handoff: the CLI polls the backend until the browser side completes
pub async fn login_poll(
    client: &HandoffClient,
    options: &LoginOptions,
    progress: &dyn LoginProgress,
) -> Result<LoginOutcome> {
    let deadline = Instant::now() + options.timeout;
    let start = client.start_poll().await?;
    let url = Url::parse(&start.verification_url)
        .map_err(|e| Error::Server(format!("invalid verification URL: {e}")))?;
    let interval = Duration::from_secs(start.interval.max(1));
    debug!(interval_secs = interval.as_secs(), "Starting poll login");

    progress.on_started(DeliveryMode::Poll).await;
    let opened = options.open_browser && open_browser(&url);
    progress.on_browser(&url, opened).await;
    progress.on_waiting().await;

    loop {
        match client.poll_status(&start.login_id, &start.poll_token).await {
            Ok(PollStatus::Complete { token, user }) => {
                progress.on_complete().await;
                return Ok(LoginOutcome {
                    token,
                    user: Some(user),
                });
            }
            Ok(PollStatus::Expired) => return Err(Error::NotFoundOrExpired),
            Ok(PollStatus::Pending) => {}
            Err(e) if e.is_retryable() => progress.on_error(&e).await,
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout(format!(
                "login not completed within {}s",
                options.timeout.as_secs()
            )));
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Ask the server who the token belongs to; failures only cost the user name
async fn identify(
    client: &HandoffClient,
    token: &str,
    progress: &dyn LoginProgress,
) -> Option<UserInfo> {
    match client.whoami(token).await {
        Ok(session) => session.map(|s| s.user),
        Err(e) => {
            progress.on_error(&e).await;
            None
        }
    }
}

fn open_browser(url: &Url) -> bool {
    match webbrowser::open(url.as_str()) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Could not launch browser");
            false
        }
    }
}
