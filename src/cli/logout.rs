//! Logout command - revoke the token and forget it locally

use crate::cli::style::{Stylize, check};
use crate::cli::{load_credentials, resolve_server};
use anstream::{eprintln, println};
use cli_handoff::client::{CredentialStore, HandoffClient};
use cli_handoff::error::Result;

/// Run the logout command
///
/// The local credential is removed even when the server cannot be reached.
pub async fn run_logout(server: Option<&str>) -> Result<()> {
    let store = CredentialStore::from_env()?;
    let Some(credentials) = load_credentials(&store) else {
        store.clear()?;
        println!("Not logged in");
        return Ok(());
    };

    let client = HandoffClient::new(&resolve_server(server, Some(&credentials)))?;
    if let Err(e) = client.revoke(&credentials.token).await {
        eprintln!(
            "{}: could not revoke token on the server: {e}",
            "warning".warn()
        );
    }

    store.clear()?;
    println!("{} Logged out of {}", check(), credentials.server.accent());
    Ok(())
}
