//! Status command - show the locally stored login

use crate::cli::load_credentials;
use crate::cli::style::{Stylize, arrow};
use anstream::println;
use cli_handoff::client::CredentialStore;
use cli_handoff::error::Result;
use cli_handoff::token::mask_token;

/// Run the status command (no network access)
pub fn run_status() -> Result<()> {
    let store = CredentialStore::from_env()?;
    let Some(credentials) = load_credentials(&store) else {
        println!("Not logged in");
        println!("{} Run {}", arrow(), "handoff login".accent());
        return Ok(());
    };

    println!("{}", "Stored login".emphasis());
    println!("  Server:   {}", credentials.server.accent());
    match &credentials.user {
        Some(user) => println!("  User:     {} ({})", user.login.accent(), user.id.muted()),
        None => println!("  User:     {}", "unknown".muted()),
    }
    println!("  Token:    {}", mask_token(&credentials.token).muted());
    println!(
        "  Obtained: {}",
        credentials.obtained_at.to_rfc3339().muted()
    );
    println!("  File:     {}", store.path().display().muted());
    Ok(())
}
