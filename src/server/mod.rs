//! Login handoff backend
//!
//! Axum router over a shared [`HandoffService`]. See the individual handlers
//! for the routes.

mod config;
mod handlers;
mod identity;
mod pages;

pub use config::{
    DEFAULT_BIND, DEFAULT_PENDING_TTL, DEFAULT_POLL_INTERVAL, DEFAULT_SESSION_TTL, ServerConfig,
};
pub use identity::{IdentityResolver, NoIdentity, StaticIdentity};
pub use pages::Page;

use crate::clock::SystemClock;
use crate::error::{Error, Result};
use crate::handoff::HandoffService;
use crate::sweep::spawn_sweeper;
use crate::token::OsRandom;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Registry + session store
    pub handoff: Arc<HandoffService>,
    /// Identity collaborator
    pub identity: Arc<dyn IdentityResolver>,
    /// Server settings
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State over an existing service (tests inject clocks and seeded randomness this way)
    pub fn new(
        config: ServerConfig,
        handoff: Arc<HandoffService>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            handoff,
            identity,
            config: Arc::new(config),
        }
    }

    /// Production state: system clock, OS randomness, resolver from config
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let pending_ttl = chrono_duration(config.pending_ttl)?;
        let session_ttl = chrono_duration(config.session_ttl)?;
        let handoff = Arc::new(HandoffService::new(
            Arc::new(SystemClock),
            Arc::new(OsRandom),
            pending_ttl,
            session_ttl,
        ));
        let identity: Arc<dyn IdentityResolver> = match config.dev_user.as_deref() {
            Some(login) => Arc::new(StaticIdentity::dev(login.trim())),
            None => Arc::new(NoIdentity),
        };
        Ok(Self::new(config, handoff, identity))
    }
}

fn chrono_duration(d: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(d).map_err(|e| Error::Config(format!("TTL out of range: {e}")))
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/login", get(handlers::login))
        .route("/login/callback", get(handlers::login_callback))
        .route("/cli/login", post(handlers::start_poll_login))
        .route("/cli/login/complete", post(handlers::complete_poll_login))
        .route("/cli/login/status", get(handlers::poll_login_status))
        .route("/cli/authorize", get(handlers::authorize_poll_login))
        .route(
            "/session",
            get(handlers::get_session).delete(handlers::revoke_session),
        )
        .with_state(state)
}

/// Run the backend until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let sweep_every = config.sweep_interval();
    let bind = config.bind;

    if config.dev_user.is_some() {
        tracing::warn!("Dev identity enabled: every browser request is treated as signed in");
    }

    let state = AppState::from_config(config)?;
    let _sweeper = spawn_sweeper(Arc::clone(&state.handoff), sweep_every);

    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| Error::Bind(format!("{bind}: {e}")))?;
    info!(address = %bind, "Handoff server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Handoff server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed
        std::future::pending::<()>().await;
    }
}
