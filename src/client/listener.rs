//! One-shot localhost callback listener for loopback logins
//!
//! Binds an ephemeral loopback port, hands out the matching `redirect_uri`
//! and waits for the backend to send the browser back with
//! `?token=…&state=…`.

use crate::error::{Error, Result};
use crate::token::constant_time_eq;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Path the backend redirects the browser to
pub const CALLBACK_PATH: &str = "/callback";

const SUCCESS_HTML: &str = "<!doctype html><html><body><h1>Login complete</h1>\
     <p>You can close this window and return to your terminal.</p></body></html>";
const FAILURE_HTML: &str = "<!doctype html><html><body><h1>Login failed</h1>\
     <p>Close this window and run the login command again.</p></body></html>";
const NOT_FOUND_HTML: &str = "<!doctype html><html><body><h1>Not found</h1></body></html>";

/// Per-connection limit on receiving the request head
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-connection limit on writing the response page
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

enum Incoming {
    Accepted(Result<TcpStream>),
    Read(std::result::Result<(TcpStream, Option<String>), JoinError>),
}

/// Query carried by a request to [`CALLBACK_PATH`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallbackPayload {
    pub(crate) token: Option<String>,
    pub(crate) state: Option<String>,
}

/// Bound loopback listener (IPv4 and/or IPv6 on the same port)
#[derive(Debug)]
pub struct CallbackListener {
    port: u16,
    v4: Option<TcpListener>,
    v6: Option<TcpListener>,
}

impl CallbackListener {
    /// Bind an ephemeral port on `127.0.0.1`, and `::1` on the same port if possible
    ///
    /// Falls back to `::1` alone when IPv4 loopback is unavailable.
    pub async fn bind() -> Result<Self> {
        let mut bind_errors: Vec<String> = Vec::new();

        match TcpListener::bind(("127.0.0.1", 0)).await {
            Ok(v4) => {
                let port = v4.local_addr()?.port();
                let v6 = TcpListener::bind(("::1", port)).await.ok();
                debug!(port, ipv6 = v6.is_some(), "Bound callback listener");
                return Ok(Self {
                    port,
                    v4: Some(v4),
                    v6,
                });
            }
            Err(err) => bind_errors.push(format!("127.0.0.1:0 ({err})")),
        }

        match TcpListener::bind(("::1", 0)).await {
            Ok(v6) => {
                let port = v6.local_addr()?.port();
                debug!(port, "Bound IPv6-only callback listener");
                return Ok(Self {
                    port,
                    v4: None,
                    v6: Some(v6),
                });
            }
            Err(err) => bind_errors.push(format!("::1:0 ({err})")),
        }

        Err(Error::Bind(bind_errors.join("; ")))
    }

    /// Port the listener is bound to
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The `redirect_uri` to hand to the backend
    pub fn redirect_uri(&self) -> String {
        if self.v4.is_some() {
            format!("http://127.0.0.1:{}{CALLBACK_PATH}", self.port)
        } else {
            format!("http://[::1]:{}{CALLBACK_PATH}", self.port)
        }
    }

    /// Wait for the callback and return the delivered token
    ///
    /// Requests for other paths are answered with 404 and the wait goes on.
    /// A callback whose `state` differs from `expected_state` fails the whole
    /// attempt; its token is dropped unseen. Connections are read
    /// concurrently, so an idle socket cannot hold up the real callback.
    pub async fn wait(mut self, expected_state: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut connections: JoinSet<(TcpStream, Option<String>)> = JoinSet::new();

        loop {
            let event = tokio::time::timeout_at(deadline, async {
                tokio::select! {
                    accepted = self.accept() => Incoming::Accepted(accepted),
                    Some(joined) = connections.join_next() => Incoming::Read(joined),
                }
            })
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no browser callback within {}s",
                    timeout.as_secs()
                ))
            })?;

            let (mut socket, request) = match event {
                Incoming::Accepted(accepted) => {
                    let mut socket = accepted?;
                    connections.spawn(async move {
                        let read = read_request(&mut socket);
                        let request = tokio::time::timeout(READ_TIMEOUT, read).await.ok().flatten();
                        (socket, request)
                    });
                    continue;
                }
                Incoming::Read(Ok(read)) => read,
                Incoming::Read(Err(err)) => {
                    debug!(error = %err, "Callback connection task failed");
                    continue;
                }
            };
            let Some(request) = request else {
                debug!("Dropped idle or empty callback connection");
                continue;
            };

            let payload = match extract_request_target(&request).map(parse_callback_target) {
                Some(Some(payload)) => payload,
                Some(None) => {
                    respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
                    continue;
                }
                None => {
                    respond(&mut socket, "400 Bad Request", FAILURE_HTML).await;
                    continue;
                }
            };

            return match validate_callback(payload, expected_state) {
                Ok(token) => {
                    respond(&mut socket, "200 OK", SUCCESS_HTML).await;
                    Ok(token)
                }
                Err(err) => {
                    warn!(error = %err, "Rejected loopback callback");
                    respond(&mut socket, "400 Bad Request", FAILURE_HTML).await;
                    Err(err)
                }
            };
        }
    }

    async fn accept(&mut self) -> Result<TcpStream> {
        let accepted = match (self.v4.as_mut(), self.v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result,
                    result = v6.accept() => result,
                }
            }
            (Some(v4), None) => v4.accept().await,
            (None, Some(v6)) => v6.accept().await,
            (None, None) => return Err(Error::Bind("no callback listener bound".into())),
        };
        let (socket, peer) = accepted?;
        debug!(%peer, "Accepted callback connection");
        Ok(socket)
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buffer = vec![0u8; 8192];
    match socket.read(&mut buffer).await {
        Ok(0) | Err(_) => None,
        Ok(size) => Some(String::from_utf8_lossy(&buffer[..size]).into_owned()),
    }
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Cache-Control: no-store\r\nReferrer-Policy: no-referrer\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let write = async {
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await
    };
    if tokio::time::timeout(WRITE_TIMEOUT, write).await.is_err() {
        debug!("Callback client stopped reading the response");
    }
}

/// Request target of a `GET` request line
fn extract_request_target(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    (method == "GET" && target.starts_with('/')).then_some(target)
}

/// `None` when the target is not the callback path
pub(crate) fn parse_callback_target(target: &str) -> Option<CallbackPayload> {
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut payload = CallbackPayload {
        token: None,
        state: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" => payload.token = Some(value.into_owned()),
            "state" => payload.state = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(payload)
}

fn validate_callback(payload: CallbackPayload, expected_state: &str) -> Result<String> {
    let state_matches = payload
        .state
        .as_deref()
        .is_some_and(|state| constant_time_eq(state, expected_state));
    if !state_matches {
        return Err(Error::StateMismatch);
    }
    payload
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Server("callback did not carry a token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_extracts_token_and_state() {
        let payload = parse_callback_target("/callback?token=tok_xyz&state=abc123").unwrap();
        assert_eq!(payload.token.as_deref(), Some("tok_xyz"));
        assert_eq!(payload.state.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_ignores_other_paths() {
        assert!(parse_callback_target("/favicon.ico").is_none());
        assert!(parse_callback_target("/callback/extra?token=t&state=s").is_none());
    }

    #[test]
    fn test_extract_request_target_requires_get() {
        assert_eq!(
            extract_request_target("GET /callback?x=1 HTTP/1.1\r\nHost: a\r\n\r\n"),
            Some("/callback?x=1")
        );
        assert_eq!(extract_request_target("POST /callback HTTP/1.1\r\n"), None);
        assert_eq!(extract_request_target(""), None);
    }

    #[test]
    fn test_state_mismatch_rejected() {
        let payload = CallbackPayload {
            token: Some("tok".into()),
            state: Some("other".into()),
        };
        assert!(matches!(
            validate_callback(payload, "abc123"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn test_missing_state_rejected() {
        let payload = CallbackPayload {
            token: Some("tok".into()),
            state: None,
        };
        assert!(matches!(
            validate_callback(payload, "abc123"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn test_missing_token_rejected() {
        let payload = CallbackPayload {
            token: None,
            state: Some("abc123".into()),
        };
        assert!(matches!(
            validate_callback(payload, "abc123"),
            Err(Error::Server(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let listener = CallbackListener::bind().await.unwrap();
        let err = listener
            .wait("abc123", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_outlive_timeout() {
        let listener = CallbackListener::bind().await.unwrap();
        let port = listener.port();
        let wait = tokio::spawn(listener.wait("abc123", Duration::from_millis(300)));

        // Connected but never sends a request line
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(3), wait)
            .await
            .expect("wait must honour its own timeout")
            .unwrap();
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_callback_behind_idle_connection_is_served() {
        let listener = CallbackListener::bind().await.unwrap();
        let port = listener.port();
        let wait = tokio::spawn(listener.wait("abc123", Duration::from_secs(10)));

        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let mut browser = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        browser
            .write_all(b"GET /callback?token=tok_xyz&state=abc123 HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(3), browser.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let token = tokio::time::timeout(Duration::from_secs(3), wait)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(token, "tok_xyz");
    }

    #[tokio::test]
    async fn test_redirect_uri_is_loopback() {
        let listener = CallbackListener::bind().await.unwrap();
        let uri = listener.redirect_uri();
        assert!(uri.ends_with(&format!(":{}/callback", listener.port())));
        assert!(crate::redirect::validate(&uri).is_ok());
    }
}
