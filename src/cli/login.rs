//! Login command - run the browser handoff and store the token

use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, check};
use crate::cli::{load_credentials, resolve_server};
use anstream::println;
use chrono::Utc;
use cli_handoff::client::{CredentialStore, Credentials, HandoffClient, LoginOptions, login};
use cli_handoff::error::{Error, Result};
use dialoguer::Confirm;
use std::io::IsTerminal;

/// Run the login command
pub async fn run_login(
    server: Option<&str>,
    options: &LoginOptions,
    assume_yes: bool,
) -> Result<()> {
    let store = CredentialStore::from_env()?;
    let existing = load_credentials(&store);

    if let Some(existing) = &existing {
        if !confirm_replace(existing, assume_yes)? {
            println!("Cancelled");
            return Ok(());
        }
    }

    let client = HandoffClient::new(&resolve_server(server, existing.as_ref()))?;
    let outcome = {
        let progress = CliProgress::default();
        login(&client, options, &progress).await?
    };

    let credentials = Credentials {
        server: client.base().to_string(),
        token: outcome.token,
        user: outcome.user,
        obtained_at: Utc::now(),
    };
    store.save(&credentials)?;

    match &credentials.user {
        Some(user) => println!(
            "{} Logged in as {} on {}",
            check(),
            user.login.accent(),
            credentials.server.accent()
        ),
        None => println!("{} Logged in to {}", check(), credentials.server.accent()),
    }
    println!(
        "  {}",
        format!("Credentials saved to {}", store.path().display()).muted()
    );
    Ok(())
}

/// Ask before overwriting a stored login; never asks without a terminal
fn confirm_replace(existing: &Credentials, assume_yes: bool) -> Result<bool> {
    if assume_yes || !std::io::stdin().is_terminal() {
        return Ok(true);
    }

    let who = existing
        .user
        .as_ref()
        .map_or_else(String::new, |u| format!(" for {}", u.login));
    Confirm::new()
        .with_prompt(format!(
            "Replace the stored login{who} on {}?",
            existing.server
        ))
        .default(true)
        .interact()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}
