//! Identity collaborator seam
//!
//! The OAuth exchange and browser session handling live outside this crate.
//! The backend only asks one question of them: "who is the authenticated user
//! behind this browser request, if anyone?"

use crate::error::Result;
use crate::types::Identity;
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Resolves the authenticated user behind a browser request
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` means "not signed in"; errors are treated as internal failures
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>>;
}

/// Treats every browser request as one fixed user (development and tests)
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    /// Resolve everything to `identity`
    pub const fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Dev identity whose user id is derived from the login
    pub fn dev(login: &str) -> Self {
        Self::new(Identity::new(format!("dev-{login}"), login))
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Identity>> {
        Ok(Some(self.identity.clone()))
    }
}

/// Nobody is ever signed in; browsers are always sent to the OAuth provider
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

#[async_trait]
impl IdentityResolver for NoIdentity {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Identity>> {
        Ok(None)
    }
}
