//! HTTP client for the handoff backend

use crate::error::{Error, Result};
use crate::types::{PollStartResponse, PollStatus, SessionInfo};
use reqwest::{Client, Response, StatusCode};
use url::Url;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the backend's CLI-facing endpoints
#[derive(Debug, Clone)]
pub struct HandoffClient {
    http: Client,
    base: Url,
}

impl HandoffClient {
    /// Client for the server at `server` (`http` or `https`)
    pub fn new(server: &str) -> Result<Self> {
        let mut base = Url::parse(server)
            .map_err(|e| Error::Config(format!("invalid server URL {server:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "server URL must be http or https, got {}",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { http, base })
    }

    /// Base URL of the server
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Config(format!("cannot build URL for {path}: {e}")))
    }

    /// Browser URL that starts a loopback login
    pub fn login_url(&self, state: &str, redirect_uri: &str) -> Result<Url> {
        let mut url = self.endpoint("login")?;
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("redirect_uri", redirect_uri);
        Ok(url)
    }

    /// `POST /cli/login`
    pub async fn start_poll(&self) -> Result<PollStartResponse> {
        let response = self.http.post(self.endpoint("cli/login")?).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// `GET /cli/login/status`
    pub async fn poll_status(&self, login_id: &str, poll_token: &str) -> Result<PollStatus> {
        let response = self
            .http
            .get(self.endpoint("cli/login/status")?)
            .query(&[("loginId", login_id), ("pollToken", poll_token)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// `GET /session`; `None` when the server no longer knows the token
    pub async fn whoami(&self, token: &str) -> Result<Option<SessionInfo>> {
        let response = self
            .http
            .get(self.endpoint("session")?)
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    /// `DELETE /session`
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint("session")?)
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let detail = body.chars().take(200).collect::<String>();
    Err(Error::Server(format!("{status} from {url}: {detail}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_carries_state_and_redirect() {
        let client = HandoffClient::new("http://127.0.0.1:8787").unwrap();
        let url = client
            .login_url("abc123", "http://127.0.0.1:51823/callback")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8787/login?state=abc123&redirect_uri=http%3A%2F%2F127.0.0.1%3A51823%2Fcallback"
        );
    }

    #[test]
    fn test_base_path_preserved() {
        let client = HandoffClient::new("https://example.com/auth").unwrap();
        assert_eq!(
            client.endpoint("cli/login").unwrap().as_str(),
            "https://example.com/auth/cli/login"
        );
    }

    #[test]
    fn test_rejects_non_http_server() {
        assert!(matches!(
            HandoffClient::new("ftp://example.com"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            HandoffClient::new("not a url"),
            Err(Error::Config(_))
        ));
    }
}
