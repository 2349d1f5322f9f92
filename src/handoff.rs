//! Server-side delivery strategies
//!
//! [`HandoffService`] ties the registry, the session store and the redirect
//! validator together into the two ways a token reaches the CLI:
//!
//! - **Loopback**: `begin_loopback` registers the CLI's `state` and validated
//!   `redirect_uri`; `complete_loopback` consumes it, mints a token and
//!   returns the URL the browser is redirected to.
//! - **Poll**: `start_poll` hands out `{loginId, browserToken, pollToken}`;
//!   the browser calls `complete_poll`, the CLI calls `poll_status` until the
//!   token is handed over exactly once.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::redirect;
use crate::registry::LoginRegistry;
use crate::session::SessionStore;
use crate::token::{RandomSource, TokenMinter, constant_time_eq, mask_token};
use crate::types::{DeliveryMode, DeliveryTarget, Identity, LoginStatus, PollStatus, StatusKind};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use url::Url;

/// Freshly started poll-mode login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLogin {
    /// Correlation id
    pub login_id: String,
    /// Secret for the browser URL
    pub browser_token: String,
    /// Secret for the CLI
    pub poll_token: String,
    /// When the pending login lapses
    pub expires_at: DateTime<Utc>,
}

/// Check a CLI-supplied correlation id before it touches the registry
pub fn validate_correlation_id(id: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("hardcoded correlation id pattern is valid")
    });
    if pattern.is_match(id) {
        Ok(())
    } else {
        Err(Error::Validation(
            "state must be 1-128 characters of [A-Za-z0-9_-]".to_string(),
        ))
    }
}

/// Login handoff service shared by all request handlers
#[derive(Debug)]
pub struct HandoffService {
    registry: LoginRegistry,
    sessions: SessionStore,
    minter: TokenMinter,
    pending_ttl: Duration,
}

impl HandoffService {
    /// Build a service over an injected clock and random source
    pub fn new(
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        pending_ttl: Duration,
        session_ttl: Duration,
    ) -> Self {
        let minter = TokenMinter::new(random);
        Self {
            registry: LoginRegistry::new(Arc::clone(&clock)),
            sessions: SessionStore::new(minter.clone(), clock, session_ttl),
            minter,
            pending_ttl,
        }
    }

    /// Pending login registry
    pub const fn registry(&self) -> &LoginRegistry {
        &self.registry
    }

    /// Issued session store
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Lifetime of pending logins
    pub const fn pending_ttl(&self) -> Duration {
        self.pending_ttl
    }

    /// Sweep both stores. Returns `(pending_logins_removed, sessions_removed)`.
    pub fn sweep(&self) -> (usize, usize) {
        (self.registry.sweep(), self.sessions.sweep())
    }

    // ------------------------------------------------------------------------
    // Loopback redirect
    // ------------------------------------------------------------------------

    /// Validate the CLI's `state` and `redirect_uri` and register the login
    ///
    /// Nothing is stored unless both inputs pass validation.
    pub fn begin_loopback(&self, state: &str, redirect_uri: &str) -> Result<DateTime<Utc>> {
        validate_correlation_id(state)?;
        let target = redirect::validate(redirect_uri).inspect_err(|reason| {
            warn!(%reason, "Rejected loopback redirect target");
        })?;

        let entry = self.registry.register(
            state,
            DeliveryTarget::Loopback(target),
            self.pending_ttl,
        )?;
        Ok(entry.expires_at)
    }

    /// Finish a loopback login for a verified identity
    ///
    /// Consumes the pending entry before minting, so a replayed callback can
    /// never produce a second token. Returns the delivery URL carrying
    /// `token` and the original `state`.
    pub fn complete_loopback(&self, state: &str, identity: Identity) -> Result<Url> {
        let snapshot = self.registry.get(state).ok_or(Error::NotFoundOrExpired)?;
        if snapshot.mode() != DeliveryMode::Loopback {
            return Err(Error::NotFoundOrExpired);
        }

        let entry = self.registry.consume(state)?;
        let DeliveryTarget::Loopback(target) = entry.target else {
            return Err(Error::Internal(
                "loopback entry lost its redirect target".to_string(),
            ));
        };

        let session = self.sessions.mint(identity);
        info!(
            user = %session.identity.login,
            port = target.port(),
            "Completed loopback login"
        );
        Ok(target.with_token(&session.token, state))
    }

    // ------------------------------------------------------------------------
    // Poll handoff
    // ------------------------------------------------------------------------

    /// Start a poll-mode login with three fresh 256-bit secrets
    pub fn start_poll(&self) -> Result<PollLogin> {
        let login_id = self.minter.generate();
        let browser_token = self.minter.generate();
        let poll_token = self.minter.generate();

        let entry = self.registry.register(
            &login_id,
            DeliveryTarget::Poll {
                browser_token: browser_token.clone(),
                poll_token: poll_token.clone(),
            },
            self.pending_ttl,
        )?;

        Ok(PollLogin {
            login_id,
            browser_token,
            poll_token,
            expires_at: entry.expires_at,
        })
    }

    /// Browser side of a poll login: mint the token and park it in the entry
    ///
    /// Every failure (unknown id, wrong secret, lapsed, already completed)
    /// surfaces as the same error so callers cannot probe for valid ids.
    pub fn complete_poll(
        &self,
        login_id: &str,
        browser_token: &str,
        identity: Identity,
    ) -> Result<()> {
        let snapshot = self
            .registry
            .get(login_id)
            .ok_or(Error::NotFoundOrExpired)?;
        let secret_matches = matches!(
            &snapshot.target,
            DeliveryTarget::Poll { browser_token: expected, .. }
                if constant_time_eq(expected, browser_token)
        );
        if !secret_matches {
            warn!(login_id = %mask_token(login_id), "Browser token mismatch on poll completion");
            return Err(Error::NotFoundOrExpired);
        }

        let session = self.sessions.mint(identity.clone());
        let complete = LoginStatus::Complete {
            token: session.token.clone(),
            identity,
        };
        if let Err(err) = self
            .registry
            .try_transition(login_id, StatusKind::Pending, complete)
        {
            // Lost the race or lapsed: the minted token must not outlive it
            self.sessions.revoke(&session.token);
            return Err(match err {
                Error::InvalidTransition { .. } | Error::AlreadyConsumed => {
                    Error::NotFoundOrExpired
                }
                other => other,
            });
        }

        info!(user = %session.identity.login, "Completed poll login");
        Ok(())
    }

    /// CLI side of a poll login
    ///
    /// The first poll after completion receives the token; every later poll
    /// (and any poll with a wrong `poll_token`) reports `Expired`.
    pub fn poll_status(&self, login_id: &str, poll_token: &str) -> PollStatus {
        let Some(snapshot) = self.registry.get(login_id) else {
            return PollStatus::Expired;
        };
        let secret_matches = matches!(
            &snapshot.target,
            DeliveryTarget::Poll { poll_token: expected, .. }
                if constant_time_eq(expected, poll_token)
        );
        if !secret_matches {
            warn!(login_id = %mask_token(login_id), "Poll token mismatch");
            return PollStatus::Expired;
        }

        match snapshot.status.kind() {
            StatusKind::Pending => PollStatus::Pending,
            StatusKind::Consumed => PollStatus::Expired,
            StatusKind::Complete => match self.registry.try_transition(
                login_id,
                StatusKind::Complete,
                LoginStatus::Consumed,
            ) {
                Ok(previous) => match previous.status {
                    // The session TTL may be shorter than the entry's
                    LoginStatus::Complete { token, identity }
                        if self.sessions.lookup(&token).is_some() =>
                    {
                        PollStatus::Complete {
                            token,
                            user: (&identity).into(),
                        }
                    }
                    LoginStatus::Complete { token, .. } => {
                        warn!(token = %mask_token(&token), "Session lapsed before poll delivery");
                        PollStatus::Expired
                    }
                    _ => PollStatus::Expired,
                },
                Err(_) => PollStatus::Expired,
            },
        }
    }
}
