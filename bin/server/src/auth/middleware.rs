//! Session middleware and extractors for Axum.

use axum::{
    Extension,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use backbone_access::{AuthContext, SESSION_COOKIE, SessionContext, SessionError, SessionPayload};
use backbone_core::RequestId;
use rootcause::Report;
use std::sync::Arc;

use super::AppState;
use crate::error::{ApiError, ErrorCode};

/// Validates the session cookie and attaches a [`SessionContext`] to the
/// request.
///
/// Rejects with `ERR.01.001` when no session is present, `ERR.01.003` when
/// it has expired and `ERR.01.002` when its expiry is unreadable.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(key) = state.session_key() else {
        return ApiError::new(ErrorCode::NotConfigured, request_id).into_response();
    };

    match read_session(request.headers(), key, chrono::Utc::now().timestamp_millis()) {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(report) => {
            tracing::debug!(error = %report, "Session rejected");
            ApiError::new(ErrorCode::from(report.current_context()), request_id).into_response()
        }
    }
}

/// Decrypts and validates the session cookie.
///
/// A cookie that fails to decrypt is treated as absent.
pub fn read_session(
    headers: &HeaderMap,
    key: Key,
    now_millis: i64,
) -> Result<SessionContext, Report<SessionError>> {
    let jar = PrivateCookieJar::from_headers(headers, key);
    let cookie = jar.get(SESSION_COOKIE).ok_or(SessionError::NotLoggedIn)?;
    SessionPayload::decode(cookie.value())?.validate(now_millis)
}

/// Returns the id assigned to the request, or a fresh one if the request
/// bypassed the id middleware.
pub(crate) fn request_id(parts: &Parts) -> RequestId {
    parts.extensions.get::<RequestId>().copied().unwrap_or_default()
}

/// Extractor for the caller's identity on session-protected routes.
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id(parts);
        let session = parts
            .extensions
            .get::<SessionContext>()
            .ok_or_else(|| ApiError::new(ErrorCode::CannotExtractSessionInfo, request_id))?;

        match AuthContext::from_session(session) {
            Ok(auth) => Ok(Authenticated(auth)),
            Err(report) => {
                tracing::warn!(error = %report, "Could not build auth context");
                Err(ApiError::new(ErrorCode::CannotExtractSessionInfo, request_id))
            }
        }
    }
}
