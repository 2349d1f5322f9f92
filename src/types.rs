//! Core types for cli-handoff

use crate::error::{Error, Result};
use crate::redirect::LoopbackUrl;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A verified user, as reported by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id
    pub user_id: String,
    /// Login / handle shown to the user
    pub login: String,
}

impl Identity {
    /// Create an identity
    pub fn new(user_id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            login: login.into(),
        }
    }
}

/// How the token will reach the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Browser is redirected to a listener the CLI runs on localhost
    Loopback,
    /// CLI polls the status endpoint
    Poll,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loopback => write!(f, "loopback"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

/// Where (or to whom) a pending login delivers its token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// Validated loopback callback URL
    Loopback(LoopbackUrl),
    /// Poll handoff secrets
    Poll {
        /// Secret carried only by the browser URL
        browser_token: String,
        /// Secret held only by the CLI
        poll_token: String,
    },
}

impl DeliveryTarget {
    /// The delivery mode implied by this target
    pub const fn mode(&self) -> DeliveryMode {
        match self {
            Self::Loopback(_) => DeliveryMode::Loopback,
            Self::Poll { .. } => DeliveryMode::Poll,
        }
    }
}

/// Lifecycle state of a pending login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// Waiting for the browser side
    Pending,
    /// Browser side finished; token minted and waiting for the CLI (poll mode)
    Complete {
        /// Minted session token
        token: String,
        /// Who the token belongs to
        identity: Identity,
    },
    /// Delivered. Inert until swept.
    Consumed,
}

impl LoginStatus {
    /// Discriminant without payload
    pub const fn kind(&self) -> StatusKind {
        match self {
            Self::Pending => StatusKind::Pending,
            Self::Complete { .. } => StatusKind::Complete,
            Self::Consumed => StatusKind::Consumed,
        }
    }
}

/// Payload-free view of [`LoginStatus`], used as the expected-from side of a
/// transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// See [`LoginStatus::Pending`]
    Pending,
    /// See [`LoginStatus::Complete`]
    Complete,
    /// See [`LoginStatus::Consumed`]
    Consumed,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Consumed => write!(f, "consumed"),
        }
    }
}

/// A login attempt waiting for the browser side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// Correlation id (CLI `state` in loopback mode, server `loginId` in poll mode)
    pub correlation_id: String,
    /// When the entry was registered
    pub created_at: DateTime<Utc>,
    /// Instant from which the entry is treated as expired
    pub expires_at: DateTime<Utc>,
    /// Delivery target
    pub target: DeliveryTarget,
    /// Current state
    pub status: LoginStatus,
}

impl PendingLogin {
    /// Create a fresh pending entry; `ttl` must be positive
    pub fn new(
        correlation_id: impl Into<String>,
        target: DeliveryTarget,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self> {
        if ttl <= Duration::zero() {
            return Err(Error::Validation("login TTL must be positive".to_string()));
        }
        Ok(Self {
            correlation_id: correlation_id.into(),
            created_at: now,
            expires_at: now + ttl,
            target,
            status: LoginStatus::Pending,
        })
    }

    /// Delivery mode of this entry
    pub const fn mode(&self) -> DeliveryMode {
        self.target.mode()
    }

    /// Whether the entry has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A minted handoff token and who it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Opaque bearer token
    pub token: String,
    /// Owner of the token
    pub identity: Identity,
    /// Mint time
    pub created_at: DateTime<Utc>,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl IssuedSession {
    /// Whether the session has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// `POST /cli/login` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStartResponse {
    /// Correlation id for this login
    pub login_id: String,
    /// Secret for the browser URL only
    pub browser_token: String,
    /// Secret for the CLI only
    pub poll_token: String,
    /// When the pending login lapses
    pub expires_at: DateTime<Utc>,
    /// URL the CLI opens in the browser
    pub verification_url: String,
    /// Recommended seconds between polls
    pub interval: u64,
}

/// `POST /cli/login/complete` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCompleteRequest {
    /// Correlation id
    pub login_id: String,
    /// Browser secret from the verification URL
    pub browser_token: String,
}

/// Public view of a user on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Stable user id
    pub id: String,
    /// Login / handle
    pub login: String,
}

impl From<&Identity> for UserInfo {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id.clone(),
            login: identity.login.clone(),
        }
    }
}

/// `GET /cli/login/status` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollStatus {
    /// Browser side not finished yet
    Pending,
    /// Delivered: only ever returned once per login
    Complete {
        /// Session token
        token: String,
        /// Token owner
        user: UserInfo,
    },
    /// Unknown, lapsed, already delivered, or wrong poll token
    Expired,
}

/// `GET /session` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Token owner
    pub user: UserInfo,
    /// When the token lapses
    pub expires_at: DateTime<Utc>,
}
