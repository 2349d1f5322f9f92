//! Serve command - run the handoff backend

use crate::cli::style::{Stylize, arrow};
use anstream::println;
use cli_handoff::error::Result;
use cli_handoff::server::{ServerConfig, serve};

/// Run the backend until Ctrl-C
pub async fn run_serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    println!(
        "{} Handoff server on {} (public URL {})",
        arrow(),
        config.bind.accent(),
        config.public_url.as_str().accent()
    );
    println!(
        "  {}",
        format!(
            "pending logins expire after {}s, tokens after {}s",
            config.pending_ttl.as_secs(),
            config.session_ttl.as_secs()
        )
        .muted()
    );
    serve(config).await
}
