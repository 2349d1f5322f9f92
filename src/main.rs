//! handoff - Log a command-line tool in through the browser
//!
//! CLI binary for both sides of the handoff: `serve` runs the backend,
//! `login` / `whoami` / `logout` / `status` manage the local login.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cli_handoff::client::{DEFAULT_LOGIN_TIMEOUT, LoginOptions};
use cli_handoff::server::{
    DEFAULT_BIND, DEFAULT_PENDING_TTL, DEFAULT_POLL_INTERVAL, DEFAULT_SESSION_TTL, ServerConfig,
};
use cli_handoff::types::DeliveryMode;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

mod cli;

use cli::style::Stylize;

#[derive(Parser)]
#[command(name = "handoff")]
#[command(about = "Log a command-line tool in through the browser")]
#[command(version)]
struct Cli {
    /// Log filter (`RUST_LOG` takes precedence)
    #[arg(long, global = true, env = "HANDOFF_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the handoff backend
    Serve {
        /// Address to listen on
        #[arg(long, env = "HANDOFF_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Externally visible base URL (defaults to http://<bind>/)
        #[arg(long, env = "HANDOFF_PUBLIC_URL")]
        public_url: Option<Url>,

        /// Seconds a login may stay pending
        #[arg(long, env = "HANDOFF_PENDING_TTL", default_value_t = DEFAULT_PENDING_TTL.as_secs())]
        pending_ttl: u64,

        /// Seconds a minted token stays valid
        #[arg(long, env = "HANDOFF_SESSION_TTL", default_value_t = DEFAULT_SESSION_TTL.as_secs())]
        session_ttl: u64,

        /// Seconds between polls recommended to poll-mode clients
        #[arg(
            long,
            env = "HANDOFF_POLL_INTERVAL",
            default_value_t = DEFAULT_POLL_INTERVAL.as_secs()
        )]
        poll_interval: u64,

        /// Where unauthenticated browsers are sent to sign in
        #[arg(long, env = "HANDOFF_OAUTH_AUTHORIZE_URL")]
        oauth_authorize_url: Option<Url>,

        /// Treat every browser as signed in as this login (development only)
        #[arg(long, env = "HANDOFF_DEV_USER")]
        dev_user: Option<String>,
    },

    /// Log in through the browser and store the token
    Login {
        /// Server URL
        #[arg(long, env = "HANDOFF_SERVER")]
        server: Option<String>,

        /// How the token reaches this terminal
        #[arg(long, value_enum, default_value_t = Mode::Loopback)]
        mode: Mode,

        /// Seconds to wait for the browser
        #[arg(long, default_value_t = DEFAULT_LOGIN_TIMEOUT.as_secs())]
        timeout: u64,

        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Replace an existing login without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show who the stored token belongs to
    Whoami {
        /// Server URL
        #[arg(long, env = "HANDOFF_SERVER")]
        server: Option<String>,
    },

    /// Revoke the stored token and delete it
    Logout {
        /// Server URL
        #[arg(long, env = "HANDOFF_SERVER")]
        server: Option<String>,
    },

    /// Show the locally stored login
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Browser redirects to a listener on localhost
    Loopback,
    /// Poll the server (no local listener; works over SSH)
    Poll,
}

impl From<Mode> for DeliveryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Loopback => Self::Loopback,
            Mode::Poll => Self::Poll,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    cli_handoff::logging::init(cli.log_level.as_deref().unwrap_or(default_level));

    if let Err(err) = run(cli.command).await {
        report(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Serve {
            bind,
            public_url,
            pending_ttl,
            session_ttl,
            poll_interval,
            oauth_authorize_url,
            dev_user,
        } => {
            let mut config = ServerConfig::new(bind)?;
            if let Some(public_url) = public_url {
                config.public_url = public_url;
            }
            config.pending_ttl = Duration::from_secs(pending_ttl);
            config.session_ttl = Duration::from_secs(session_ttl);
            config.poll_interval = Duration::from_secs(poll_interval);
            config.oauth_authorize_url = oauth_authorize_url;
            config.dev_user = dev_user;
            cli::run_serve(config).await?;
        }
        Commands::Login {
            server,
            mode,
            timeout,
            no_browser,
            yes,
        } => {
            let options = LoginOptions {
                mode: mode.into(),
                timeout: Duration::from_secs(timeout),
                open_browser: !no_browser,
            };
            cli::run_login(server.as_deref(), &options, yes).await?;
        }
        Commands::Whoami { server } => cli::run_whoami(server.as_deref()).await?,
        Commands::Logout { server } => cli::run_logout(server.as_deref()).await?,
        Commands::Status => cli::run_status()?,
    }
    Ok(())
}

/// Styled `error:` line plus a remediation hint on stderr
fn report(err: &anyhow::Error) {
    anstream::eprintln!("{}: {err:#}", "error".error());
    if let Some(err) = err.downcast_ref::<cli_handoff::error::Error>() {
        anstream::eprintln!("  {}", err.remediation().muted().for_stderr());
    }
}
