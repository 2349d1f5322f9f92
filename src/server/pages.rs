//! Browser-facing pages
//!
//! Static text only: no request data, token values or error internals are
//! ever rendered.

use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};

/// A finished browser page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Poll login completed; the CLI will pick the token up
    PollComplete,
    /// The login link is unknown, lapsed or already used
    Expired,
    /// The login request itself was malformed
    InvalidRequest,
    /// No signed-in user and nowhere to send the browser to sign in
    SignInRequired,
    /// Something went wrong on our side
    InternalError,
}

impl Page {
    const fn status(self) -> StatusCode {
        match self {
            Self::PollComplete => StatusCode::OK,
            Self::Expired => StatusCode::GONE,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::SignInRequired => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::PollComplete => "Login complete",
            Self::Expired => "Login link expired",
            Self::InvalidRequest => "Invalid login request",
            Self::SignInRequired => "Sign-in required",
            Self::InternalError => "Something went wrong",
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::PollComplete => "You can close this window and return to your terminal.",
            Self::Expired => {
                "This login link has expired or was already used. Run the login command again from your terminal."
            }
            Self::InvalidRequest => {
                "The login request from your terminal was rejected. Run the login command again."
            }
            Self::SignInRequired => {
                "Sign in to the web app first, then run the login command again."
            }
            Self::InternalError => {
                "Please try again in a moment by running the login command again."
            }
        }
    }

    fn render(self) -> String {
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
             <body><h1>{title}</h1><p>{message}</p></body></html>",
            title = self.title(),
            message = self.message()
        )
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        (
            self.status(),
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::REFERRER_POLICY, "no-referrer"),
            ],
            Html(self.render()),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_page_status() {
        let response = Page::Expired.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[test]
    fn test_pages_render_title() {
        assert!(Page::PollComplete.render().contains("<h1>Login complete</h1>"));
    }
}
