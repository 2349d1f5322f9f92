//! cli-handoff - Hand a web login over to a command-line tool
//!
//! A user runs `handoff login`, finishes signing in in the browser, and the
//! backend delivers a short-lived bearer token back to the terminal, either
//! by redirecting the browser to a loopback listener the CLI runs, or by
//! letting the CLI poll for it.
//!
//! - [`server`]: axum backend ([`handoff::HandoffService`] behind HTTP)
//! - [`client`]: CLI side (callback listener, poll loop, credential store)
//! - [`registry`] / [`session`]: in-memory stores with exactly-once transitions
//! - [`redirect`]: loopback `redirect_uri` validation

pub mod client;
pub mod clock;
pub mod error;
pub mod handoff;
pub mod logging;
pub mod redirect;
pub mod registry;
pub mod server;
pub mod session;
pub mod sweep;
pub mod token;
pub mod types;
