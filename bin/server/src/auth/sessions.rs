//! Password login with cookie sessions.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::extract::{
    CookieJar, PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use backbone_access::{AuthContext, SESSION_COOKIE, SESSION_TTL_HOURS, Session, SessionContext};
use backbone_core::RequestId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, Authenticated};
use crate::error::{ApiError, ErrorCode};

/// Body of `POST /auth/sessions/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_valid: bool,
    pub message: &'static str,
}

/// Verifies the password and issues a session cookie.
///
/// An unknown user and a wrong password produce the same response.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Malformed login request");
        ApiError::new(ErrorCode::MalformedRequest, request_id)
    })?;
    let key = state
        .session_key()
        .ok_or(ApiError::new(ErrorCode::NotConfigured, request_id))?;

    let engine = state.engine();
    if !engine.verify_password(&request.username, &request.password).await {
        tracing::info!(username = %request.username, "Login failed");
        return Err(ApiError::new(ErrorCode::WrongCredentials, request_id));
    }

    let roles = engine.get_user_roles(&request.username).unwrap_or_else(|report| {
        tracing::warn!(error = %report, "No roles for logged in user");
        Vec::new()
    });
    let session = Session::issue(request.username, roles);
    let value = session
        .to_payload()
        .and_then(|payload| payload.encode())
        .map_err(|report| {
            tracing::error!(error = %report, "Failed to encode session");
            ApiError::new(ErrorCode::CannotExtractSessionInfo, request_id)
        })?;

    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::hours(SESSION_TTL_HOURS));

    tracing::info!(username = %session.username(), "Logged in");
    let jar = PrivateCookieJar::from_headers(&headers, key).add(cookie);
    Ok((jar, Json(MessageResponse { message: "logged in" })))
}

/// Returns the caller's identity and role permissions.
pub async fn userinfo(Authenticated(auth): Authenticated) -> Json<AuthContext> {
    Json(auth)
}

/// Reports whether the session is still valid instead of rejecting.
pub async fn validate(session: Option<Extension<SessionContext>>) -> Json<ValidateResponse> {
    let auth = session
        .ok_or(())
        .and_then(|Extension(session)| AuthContext::from_session(&session).map_err(|_| ()));

    let response = match auth {
        Err(()) => ValidateResponse {
            is_valid: false,
            message: ErrorCode::CannotExtractSessionInfo.message(),
        },
        Ok(auth) if auth.is_expired(chrono::Utc::now().timestamp_millis()) => ValidateResponse {
            is_valid: false,
            message: ErrorCode::SessionExpired.message(),
        },
        Ok(_) => ValidateResponse {
            is_valid: true,
            message: "session is valid",
        },
    };
    Json(response)
}

/// Tells the client to discard the session cookie.
///
/// The session itself stays valid until it expires; there is nothing to
/// revoke server-side.
pub async fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// `GET /main/ping`: echoes the caller's identity.
pub async fn ping(Authenticated(auth): Authenticated) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "username": auth.username(),
        "roles": auth.roles(),
    }))
}
