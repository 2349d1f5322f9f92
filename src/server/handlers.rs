//! HTTP handlers
//!
//! Browser-facing routes answer with redirects or [`Page`]s; CLI-facing
//! routes answer with JSON. Internal error details are logged, never sent.

use crate::error::Error;
use crate::server::AppState;
use crate::server::pages::Page;
use crate::types::{
    Identity, PollCompleteRequest, PollStartResponse, PollStatus, SessionInfo, UserInfo,
};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

/// `GET /login` query
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    state: Option<String>,
    redirect_uri: Option<String>,
}

/// `GET /login/callback` query
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    state: Option<String>,
}

/// `GET /cli/login/status` query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    login_id: Option<String>,
    poll_token: Option<String>,
}

/// `GET /cli/authorize` query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeParams {
    login_id: Option<String>,
    browser_token: Option<String>,
}

/// `GET /health` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    pending_logins: usize,
    sessions: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pending_logins: state.handoff.registry().len(),
        sessions: state.handoff.sessions().len(),
    })
}

/// Ask the identity collaborator who is behind this request
async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<Option<Identity>, Page> {
    state.identity.resolve(headers).await.map_err(|e| {
        error!(error = %e, "Identity resolver failed");
        Page::InternalError
    })
}

fn deliver(url: &url::Url) -> Response {
    (
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::REFERRER_POLICY, "no-referrer"),
        ],
        Redirect::to(url.as_str()),
    )
        .into_response()
}

fn loopback_failure(err: &Error) -> Page {
    match err {
        Error::NotFoundOrExpired | Error::AlreadyConsumed | Error::InvalidTransition { .. } => {
            Page::Expired
        }
        other => {
            error!(error = %other, "Loopback completion failed");
            Page::InternalError
        }
    }
}

/// `GET /login?state=&redirect_uri=`: loopback initiation
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LoginParams>,
) -> Response {
    let (Some(login_state), Some(redirect_uri)) = (params.state, params.redirect_uri) else {
        return Page::InvalidRequest.into_response();
    };

    match state.handoff.begin_loopback(&login_state, &redirect_uri) {
        Ok(_) => {}
        Err(Error::Validation(_) | Error::InvalidRedirect(_)) => {
            return Page::InvalidRequest.into_response();
        }
        Err(Error::DuplicateCorrelationId) => {
            warn!("Loopback login reused a pending state");
            return Page::InvalidRequest.into_response();
        }
        Err(err) => {
            error!(error = %err, "Failed to register loopback login");
            return Page::InternalError.into_response();
        }
    }

    let identity = match resolve_identity(&state, &headers).await {
        Ok(identity) => identity,
        Err(page) => return page.into_response(),
    };

    if let Some(identity) = identity {
        return match state.handoff.complete_loopback(&login_state, identity) {
            Ok(url) => deliver(&url),
            Err(err) => loopback_failure(&err).into_response(),
        };
    }

    match &state.config.oauth_authorize_url {
        Some(authorize) => {
            let mut url = authorize.clone();
            url.query_pairs_mut().append_pair("state", &login_state);
            Redirect::to(url.as_str()).into_response()
        }
        None => Page::SignInRequired.into_response(),
    }
}

/// `GET /login/callback?state=`: return point after OAuth sign-in
pub async fn login_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(login_state) = params.state else {
        return Page::InvalidRequest.into_response();
    };

    let identity = match resolve_identity(&state, &headers).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Page::SignInRequired.into_response(),
        Err(page) => return page.into_response(),
    };

    match state.handoff.complete_loopback(&login_state, identity) {
        Ok(url) => deliver(&url),
        Err(err) => loopback_failure(&err).into_response(),
    }
}

/// `POST /cli/login`: poll-mode initiation
pub async fn start_poll_login(State(state): State<AppState>) -> Response {
    let login = match state.handoff.start_poll() {
        Ok(login) => login,
        Err(err) => {
            error!(error = %err, "Failed to start poll login");
            return internal_json();
        }
    };

    let mut verification_url = match state.config.url_for("cli/authorize") {
        Ok(url) => url,
        Err(err) => {
            error!(error = %err, "Failed to build verification URL");
            return internal_json();
        }
    };
    verification_url
        .query_pairs_mut()
        .append_pair("loginId", &login.login_id)
        .append_pair("browserToken", &login.browser_token);

    Json(PollStartResponse {
        login_id: login.login_id,
        browser_token: login.browser_token,
        poll_token: login.poll_token,
        expires_at: login.expires_at,
        verification_url: verification_url.into(),
        interval: state.config.poll_interval.as_secs().max(1),
    })
    .into_response()
}

/// `POST /cli/login/complete`: browser reports an authenticated identity
pub async fn complete_poll_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PollCompleteRequest>,
) -> Response {
    let identity = match state.identity.resolve(&headers).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthenticated" })),
            )
                .into_response();
        }
        Err(err) => {
            error!(error = %err, "Identity resolver failed");
            return internal_json();
        }
    };

    match state
        .handoff
        .complete_poll(&body.login_id, &body.browser_token, identity)
    {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(Error::NotFoundOrExpired) => {
            (StatusCode::BAD_REQUEST, Json(PollStatus::Expired)).into_response()
        }
        Err(err) => {
            error!(error = %err, "Poll completion failed");
            internal_json()
        }
    }
}

/// `GET /cli/authorize?loginId=&browserToken=`: browser landing page
pub async fn authorize_poll_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let (Some(login_id), Some(browser_token)) = (params.login_id, params.browser_token) else {
        return Page::InvalidRequest.into_response();
    };

    let identity = match resolve_identity(&state, &headers).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Page::SignInRequired.into_response(),
        Err(page) => return page.into_response(),
    };

    match state
        .handoff
        .complete_poll(&login_id, &browser_token, identity)
    {
        Ok(()) => Page::PollComplete.into_response(),
        Err(Error::NotFoundOrExpired) => Page::Expired.into_response(),
        Err(err) => {
            error!(error = %err, "Poll completion failed");
            Page::InternalError.into_response()
        }
    }
}

/// `GET /cli/login/status?loginId=&pollToken=`
pub async fn poll_login_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Response {
    let status = match (params.login_id, params.poll_token) {
        (Some(login_id), Some(poll_token)) => state.handoff.poll_status(&login_id, &poll_token),
        _ => PollStatus::Expired,
    };
    ([(header::CACHE_CONTROL, "no-store")], Json(status)).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "invalid or expired token" })),
    )
        .into_response()
}

/// `GET /session`: look up the bearer token
pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };
    match state.handoff.sessions().lookup(token) {
        Some(session) => Json(SessionInfo {
            user: UserInfo::from(&session.identity),
            expires_at: session.expires_at,
        })
        .into_response(),
        None => unauthorized(),
    }
}

/// `DELETE /session`: revoke the bearer token
///
/// Answers 204 whether or not the token existed.
pub async fn revoke_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };
    state.handoff.sessions().revoke(token);
    StatusCode::NO_CONTENT.into_response()
}

fn internal_json() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error, please retry" })),
    )
        .into_response()
}
