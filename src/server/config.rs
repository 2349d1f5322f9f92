//! Backend configuration

use crate::error::{Error, Result};
use crate::sweep::sweep_interval;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default lifetime of a pending login
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(600);

/// Default lifetime of a minted handoff token
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);

/// Default recommended poll interval handed to poll-mode clients
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Settings for `handoff serve`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: SocketAddr,
    /// Externally visible base URL (used to build browser URLs)
    pub public_url: Url,
    /// Lifetime of pending logins
    pub pending_ttl: Duration,
    /// Lifetime of minted tokens
    pub session_ttl: Duration,
    /// Poll interval recommended to clients
    pub poll_interval: Duration,
    /// Where unauthenticated browsers are sent to sign in (`state` appended)
    pub oauth_authorize_url: Option<Url>,
    /// Development identity: every browser request is treated as this login
    pub dev_user: Option<String>,
}

impl ServerConfig {
    /// Config listening on `bind` with every other setting at its default
    pub fn new(bind: SocketAddr) -> Result<Self> {
        let public_url = Url::parse(&format!("http://{bind}/"))
            .map_err(|e| Error::Config(format!("cannot derive public URL from {bind}: {e}")))?;
        Ok(Self {
            bind,
            public_url,
            pending_ttl: DEFAULT_PENDING_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            oauth_authorize_url: None,
            dev_user: None,
        })
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pending_ttl.is_zero() {
            return Err(Error::Config("pending login TTL must be positive".into()));
        }
        if self.session_ttl.is_zero() {
            return Err(Error::Config("session TTL must be positive".into()));
        }
        if !matches!(self.public_url.scheme(), "http" | "https") {
            return Err(Error::Config("public URL must be http or https".into()));
        }
        if let Some(url) = &self.oauth_authorize_url {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(
                    "OAuth authorize URL must be http or https".into(),
                ));
            }
        }
        if self.dev_user.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(Error::Config("dev user must not be empty".into()));
        }
        Ok(())
    }

    /// Background sweep interval for these TTLs
    pub fn sweep_interval(&self) -> Duration {
        sweep_interval(self.pending_ttl, self.session_ttl)
    }

    /// Absolute URL for a path on this server
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.public_url
            .join(path)
            .map_err(|e| Error::Config(format!("cannot build URL for {path}: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let bind: SocketAddr = DEFAULT_BIND
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)));
        Self {
            bind,
            public_url: Url::parse("http://127.0.0.1:8787/")
                .expect("hardcoded default public URL is valid"),
            pending_ttl: DEFAULT_PENDING_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            oauth_authorize_url: None,
            dev_user: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_public_url_derived_from_bind() {
        let config = ServerConfig::new("127.0.0.1:9000".parse().unwrap()).unwrap();
        assert_eq!(config.public_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(
            config.url_for("cli/authorize").unwrap().as_str(),
            "http://127.0.0.1:9000/cli/authorize"
        );
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = ServerConfig {
            session_ttl: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_dev_user_rejected() {
        let config = ServerConfig {
            dev_user: Some("  ".into()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
