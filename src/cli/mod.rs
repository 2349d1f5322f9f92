//! CLI commands
//!
//! Command implementations for the `handoff` binary.

mod login;
mod logout;
mod progress;
mod serve;
mod status;
pub mod style;
mod whoami;

pub use login::run_login;
pub use logout::run_logout;
pub use serve::run_serve;
pub use status::run_status;
pub use whoami::run_whoami;

use cli_handoff::client::{CredentialStore, Credentials};
use tracing::warn;

/// Server used when neither a flag nor a stored login names one
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

/// `--server` / `HANDOFF_SERVER`, else the stored login's server, else the default
fn resolve_server(flag: Option<&str>, stored: Option<&Credentials>) -> String {
    flag.map(str::to_string)
        .or_else(|| stored.map(|c| c.server.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER.to_string())
}

/// Stored credentials; an unreadable file counts as "not logged in"
fn load_credentials(store: &CredentialStore) -> Option<Credentials> {
    match store.load() {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!(
                path = %store.path().display(),
                error = %e,
                "Ignoring unreadable credential file"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(server: &str) -> Credentials {
        Credentials {
            server: server.into(),
            token: "tok".into(),
            user: None,
            obtained_at: Utc::now(),
        }
    }

    #[test]
    fn test_flag_wins() {
        let creds = stored("http://stored.example/");
        assert_eq!(
            resolve_server(Some("http://flag.example"), Some(&creds)),
            "http://flag.example"
        );
    }

    #[test]
    fn test_stored_then_default() {
        let creds = stored("http://stored.example/");
        assert_eq!(resolve_server(None, Some(&creds)), "http://stored.example/");
        assert_eq!(resolve_server(None, None), DEFAULT_SERVER);
    }
}
