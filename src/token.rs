//! Secret generation and comparison
//!
//! Every secret in the protocol (session tokens, poll-mode login ids and the
//! browser/poll secrets, CLI correlation ids) comes from a [`TokenMinter`]
//! drawing on an injected [`RandomSource`].

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use subtle::ConstantTimeEq;

/// Bytes of entropy per generated secret (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Length of an encoded secret: base64url without padding of [`TOKEN_BYTES`]
pub const TOKEN_LEN: usize = 43;

const MASK_PREFIX_LEN: usize = 6;
const MASK_SUFFIX_LEN: usize = 4;

/// Source of random bytes
pub trait RandomSource: Send + Sync + Debug {
    /// Fill `dest` with random bytes
    fn fill(&self, dest: &mut [u8]);
}

/// Operating-system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Deterministic generator for tests. Never use it to mint real credentials.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator from a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(dest);
    }
}

/// Generates URL-safe, high-entropy opaque secrets
#[derive(Debug, Clone)]
pub struct TokenMinter {
    random: Arc<dyn RandomSource>,
}

impl TokenMinter {
    /// Create a minter over the given random source
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Minter backed by the OS CSPRNG
    pub fn os() -> Self {
        Self::new(Arc::new(OsRandom))
    }

    /// Generate one secret: [`TOKEN_BYTES`] random bytes, base64url, no padding.
    ///
    /// The alphabet is `[A-Za-z0-9_-]`, so the value needs no escaping in a
    /// query string.
    pub fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.random.fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

impl Default for TokenMinter {
    fn default() -> Self {
        Self::os()
    }
}

/// Compare caller-supplied secrets against stored ones without leaking timing
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Render a token for logs and status output
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let len = trimmed.len();
    if len <= MASK_PREFIX_LEN + MASK_SUFFIX_LEN || !trimmed.is_ascii() {
        return "*".repeat(len.min(8));
    }

    let prefix = &trimmed[..MASK_PREFIX_LEN];
    let suffix = &trimmed[len - MASK_SUFFIX_LEN..];
    format!("{prefix}...{suffix}")
}
