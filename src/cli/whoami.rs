//! Whoami command - ask the server who the stored token belongs to

use crate::cli::style::{Stylize, arrow, check, cross};
use crate::cli::{load_credentials, resolve_server};
use anstream::{eprintln, println};
use cli_handoff::client::{CredentialStore, HandoffClient};
use cli_handoff::error::Result;

/// Run the whoami command
pub async fn run_whoami(server: Option<&str>) -> Result<()> {
    let store = CredentialStore::from_env()?;
    let Some(credentials) = load_credentials(&store) else {
        println!("Not logged in");
        println!("{} Run {}", arrow(), "handoff login".accent());
        return Ok(());
    };

    let client = HandoffClient::new(&resolve_server(server, Some(&credentials)))?;
    match client.whoami(&credentials.token).await? {
        Some(session) => {
            println!(
                "{} Logged in as {} ({})",
                check(),
                session.user.login.accent(),
                session.user.id.muted()
            );
            println!("  Server:  {}", client.base().as_str().accent());
            println!(
                "  Expires: {}",
                session.expires_at.to_rfc3339().muted()
            );
        }
        None => {
            eprintln!(
                "{} Stored token is no longer valid on {}",
                cross(),
                client.base().as_str().accent().for_stderr()
            );
            println!("{} Run {}", arrow(), "handoff login".accent());
        }
    }
    Ok(())
}
