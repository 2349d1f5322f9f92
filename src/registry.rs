//! Login request registry
//!
//! In-memory map of pending logins keyed by correlation id. Every state
//! change goes through [`LoginRegistry::try_transition`], which checks and
//! mutates under a single lock: of any number of concurrent callers racing
//! on one id, exactly one observes a given transition.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::{DeliveryTarget, LoginStatus, PendingLogin, StatusKind};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Pending logins with TTL and exactly-once transitions
#[derive(Debug)]
pub struct LoginRegistry {
    entries: Mutex<HashMap<String, PendingLogin>>,
    clock: Arc<dyn Clock>,
}

impl LoginRegistry {
    /// Create an empty registry reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    // Critical sections never leave the map half-updated, so a poisoned lock
    // is still safe to use.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, PendingLogin>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new pending login
    ///
    /// Fails with [`Error::DuplicateCorrelationId`] if a live entry already
    /// uses `correlation_id`. A lapsed entry with the same id is replaced.
    pub fn register(
        &self,
        correlation_id: &str,
        target: DeliveryTarget,
        ttl: Duration,
    ) -> Result<PendingLogin> {
        let now = self.clock.now();
        let entry = PendingLogin::new(correlation_id, target, now, ttl)?;

        let mut entries = self.entries();
        if entries
            .get(correlation_id)
            .is_some_and(|existing| !existing.is_expired(now))
        {
            return Err(Error::DuplicateCorrelationId);
        }
        entries.insert(correlation_id.to_string(), entry.clone());

        debug!(mode = %entry.mode(), expires_at = %entry.expires_at, "Registered pending login");
        Ok(entry)
    }

    /// Snapshot of a live entry, or `None` if unknown or lapsed
    pub fn get(&self, correlation_id: &str) -> Option<PendingLogin> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get(correlation_id) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(correlation_id);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Atomically move an entry from `expected` to `to`
    ///
    /// Returns the entry as it was before the transition. Errors:
    /// - [`Error::NotFoundOrExpired`]: unknown id or lapsed entry
    /// - [`Error::AlreadyConsumed`]: entry was already delivered
    /// - [`Error::InvalidTransition`]: entry is in some other state
    pub fn try_transition(
        &self,
        correlation_id: &str,
        expected: StatusKind,
        to: LoginStatus,
    ) -> Result<PendingLogin> {
        let now = self.clock.now();
        let mut entries = self.entries();

        let expired = entries
            .get(correlation_id)
            .ok_or(Error::NotFoundOrExpired)?
            .is_expired(now);
        if expired {
            entries.remove(correlation_id);
            return Err(Error::NotFoundOrExpired);
        }

        let entry = entries
            .get_mut(correlation_id)
            .ok_or(Error::NotFoundOrExpired)?;
        let actual = entry.status.kind();
        if actual != expected {
            return Err(match actual {
                StatusKind::Consumed => Error::AlreadyConsumed,
                _ => Error::InvalidTransition { expected, actual },
            });
        }

        let previous = entry.clone();
        entry.status = to;
        debug!(from = %actual, to = %entry.status.kind(), "Pending login transitioned");
        Ok(previous)
    }

    /// Redeem a pending entry exactly once
    ///
    /// The entry is left in place as `Consumed` (inert) until its TTL lapses,
    /// so a replay reports [`Error::AlreadyConsumed`] rather than succeeding.
    pub fn consume(&self, correlation_id: &str) -> Result<PendingLogin> {
        self.try_transition(correlation_id, StatusKind::Pending, LoginStatus::Consumed)
    }

    /// Remove every lapsed entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept pending logins");
        }
        removed
    }

    /// Number of stored entries (including lapsed ones not yet swept)
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::redirect::validate;
    use crate::types::Identity;
    use std::sync::Barrier;
    use std::thread;

    fn setup() -> (Arc<ManualClock>, LoginRegistry) {
        let clock = Arc::new(ManualClock::default());
        let registry = LoginRegistry::new(clock.clone());
        (clock, registry)
    }

    fn loopback_target() -> DeliveryTarget {
        DeliveryTarget::Loopback(validate("http://127.0.0.1:51823/callback").unwrap())
    }

    #[test]
    fn test_register_then_consume_returns_target() {
        let (_, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();

        let entry = registry.consume("abc12345").unwrap();
        assert_eq!(entry.target, loopback_target());
        assert_eq!(entry.status, LoginStatus::Pending);
    }

    #[test]
    fn test_consume_succeeds_at_most_once() {
        let (_, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();

        assert!(registry.consume("abc12345").is_ok());
        assert!(matches!(
            registry.consume("abc12345"),
            Err(Error::AlreadyConsumed)
        ));
        assert!(matches!(
            registry.consume("abc12345"),
            Err(Error::AlreadyConsumed)
        ));
    }

    #[test]
    fn test_consume_unknown_id() {
        let (_, registry) = setup();
        assert!(matches!(
            registry.consume("nope"),
            Err(Error::NotFoundOrExpired)
        ));
    }

    #[test]
    fn test_duplicate_correlation_id_rejected() {
        let (_, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();
        assert!(matches!(
            registry.register("abc12345", loopback_target(), Duration::minutes(5)),
            Err(Error::DuplicateCorrelationId)
        ));
    }

    #[test]
    fn test_consumed_id_cannot_be_reregistered_until_expiry() {
        let (clock, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();
        registry.consume("abc12345").unwrap();
        assert!(matches!(
            registry.register("abc12345", loopback_target(), Duration::minutes(5)),
            Err(Error::DuplicateCorrelationId)
        ));

        clock.advance(Duration::minutes(5));
        assert!(
            registry
                .register("abc12345", loopback_target(), Duration::minutes(5))
                .is_ok()
        );
    }

    #[test]
    fn test_ttl_boundary() {
        let (clock, registry) = setup();
        let entry = registry
            .register("abc12345", loopback_target(), Duration::seconds(60))
            .unwrap();

        clock.set(entry.expires_at - Duration::milliseconds(1));
        assert!(registry.get("abc12345").is_some());

        clock.set(entry.expires_at + Duration::milliseconds(1));
        assert!(registry.get("abc12345").is_none());
        assert!(matches!(
            registry.consume("abc12345"),
            Err(Error::NotFoundOrExpired)
        ));
    }

    #[test]
    fn test_consume_just_before_expiry() {
        let (clock, registry) = setup();
        let entry = registry
            .register("abc12345", loopback_target(), Duration::seconds(60))
            .unwrap();
        clock.set(entry.expires_at - Duration::milliseconds(1));
        assert!(registry.consume("abc12345").is_ok());
    }

    #[test]
    fn test_expired_access_removes_entry() {
        let (clock, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::seconds(1))
            .unwrap();
        clock.advance(Duration::seconds(2));
        assert_eq!(registry.len(), 1);
        assert!(registry.consume("abc12345").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (clock, registry) = setup();
        registry
            .register("short-lived", loopback_target(), Duration::seconds(10))
            .unwrap();
        registry
            .register("long-lived", loopback_target(), Duration::seconds(100))
            .unwrap();

        clock.advance(Duration::seconds(50));
        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("long-lived").is_some());
    }

    #[test]
    fn test_try_transition_wrong_state() {
        let (_, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();

        let err = registry
            .try_transition("abc12345", StatusKind::Complete, LoginStatus::Consumed)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                expected: StatusKind::Complete,
                actual: StatusKind::Pending
            }
        ));
    }

    #[test]
    fn test_try_transition_through_poll_states() {
        let (_, registry) = setup();
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();

        let complete = LoginStatus::Complete {
            token: "tok".into(),
            identity: Identity::new("1", "alice"),
        };
        registry
            .try_transition("abc12345", StatusKind::Pending, complete.clone())
            .unwrap();
        let previous = registry
            .try_transition("abc12345", StatusKind::Complete, LoginStatus::Consumed)
            .unwrap();
        assert_eq!(previous.status, complete);
        assert_eq!(registry.get("abc12345").unwrap().status, LoginStatus::Consumed);
    }

    #[test]
    fn test_concurrent_consume_single_winner() {
        const RACERS: usize = 16;
        let (_, registry) = setup();
        let registry = Arc::new(registry);
        registry
            .register("abc12345", loopback_target(), Duration::minutes(5))
            .unwrap();

        let barrier = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.consume("abc12345").is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
