//! CLI side of the handoff
//!
//! [`login`] runs either delivery strategy against a [`HandoffClient`];
//! [`CredentialStore`] keeps the resulting token on disk.

mod api;
mod credentials;
mod listener;
mod login;
mod progress;

pub use api::HandoffClient;
pub use credentials::{CONFIG_DIR_ENV, CredentialStore, Credentials};
pub use listener::{CALLBACK_PATH, CallbackListener};
pub use login::{
    DEFAULT_LOGIN_TIMEOUT, LoginOptions, LoginOutcome, login, login_loopback, login_poll,
};
pub use progress::{LoginProgress, NoopProgress};
