//! Issued session store
//!
//! Handoff tokens are short-lived: the CLI trades them for its own local
//! credential, so the default TTL is minutes, not days.

use crate::clock::Clock;
use crate::token::{TokenMinter, mask_token};
use crate::types::{Identity, IssuedSession};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Minted tokens keyed by the token itself
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, IssuedSession>>,
    minter: TokenMinter,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store
    pub fn new(minter: TokenMinter, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            minter,
            clock,
            ttl,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, IssuedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lifetime given to newly minted sessions
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a fresh token bound to `identity`
    pub fn mint(&self, identity: Identity) -> IssuedSession {
        let now = self.clock.now();
        let mut sessions = self.sessions();

        // 256-bit tokens do not collide in practice; the loop keeps the
        // one-token-one-identity invariant unconditional.
        let token = loop {
            let candidate = self.minter.generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = IssuedSession {
            token: token.clone(),
            identity,
            created_at: now,
            expires_at: now + self.ttl,
        };
        sessions.insert(token, session.clone());

        info!(
            user = %session.identity.login,
            token = %mask_token(&session.token),
            expires_at = %session.expires_at,
            "Minted session token"
        );
        session
    }

    /// Find a live session by token
    pub fn lookup(&self, token: &str) -> Option<IssuedSession> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        match sessions.get(token) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(token);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Delete a session immediately. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions().remove(token).is_some();
        if removed {
            info!(token = %mask_token(token), "Revoked session token");
        }
        removed
    }

    /// Remove every lapsed session. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "Swept sessions");
        }
        removed
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// Whether no sessions are stored
    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::token::{SeededRandom, TOKEN_LEN};

    fn setup() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::default());
        let store = SessionStore::new(
            TokenMinter::new(Arc::new(SeededRandom::new(42))),
            clock.clone(),
            Duration::minutes(5),
        );
        (clock, store)
    }

    #[test]
    fn test_mint_then_lookup() {
        let (_, store) = setup();
        let session = store.mint(Identity::new("1", "alice"));
        assert_eq!(session.token.len(), TOKEN_LEN);

        let found = store.lookup(&session.token).unwrap();
        assert_eq!(found.identity, Identity::new("1", "alice"));
        assert_eq!(found.expires_at - found.created_at, Duration::minutes(5));
    }

    #[test]
    fn test_tokens_are_unique_per_mint() {
        let (_, store) = setup();
        let a = store.mint(Identity::new("1", "alice"));
        let b = store.mint(Identity::new("1", "alice"));
        assert_ne!(a.token, b.token);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_lookup_unknown_token() {
        let (_, store) = setup();
        assert!(store.lookup("not-a-token").is_none());
    }

    #[test]
    fn test_revoke_is_immediate() {
        let (_, store) = setup();
        let session = store.mint(Identity::new("1", "alice"));
        assert!(store.revoke(&session.token));
        assert!(store.lookup(&session.token).is_none());
        assert!(!store.revoke(&session.token));
    }

    #[test]
    fn test_session_expires() {
        let (clock, store) = setup();
        let session = store.mint(Identity::new("1", "alice"));

        clock.set(session.expires_at - Duration::milliseconds(1));
        assert!(store.lookup(&session.token).is_some());

        clock.set(session.expires_at + Duration::milliseconds(1));
        assert!(store.lookup(&session.token).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep() {
        let (clock, store) = setup();
        store.mint(Identity::new("1", "alice"));
        clock.advance(Duration::minutes(3));
        let fresh = store.mint(Identity::new("2", "bob"));
        clock.advance(Duration::minutes(3));

        assert_eq!(store.sweep(), 1);
        assert!(store.lookup(&fresh.token).is_some());
    }
}
