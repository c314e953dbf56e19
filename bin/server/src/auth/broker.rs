//! OIDC broker routes.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use backbone_access::{BrokerError, IssuedToken, Jwks, OidcBroker, TOKEN_COOKIE, TOKEN_TTL_HOURS};
use backbone_core::RequestId;
use rootcause::Report;
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::AppState;
use crate::error::{ApiError, ErrorCode};

/// Cookie pinning the CSRF value of a login in progress.
pub const STATE_COOKIE: &str = "backbone_oidc_state";

/// How long a login may take between redirect and callback.
const STATE_COOKIE_MINUTES: i64 = 10;

/// Query parameters for the OIDC callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

fn broker(state: &AppState, request_id: RequestId) -> Result<Arc<OidcBroker>, ApiError> {
    state
        .broker()
        .ok_or(ApiError::new(ErrorCode::NotConfigured, request_id))
}

fn broker_error(report: &Report<BrokerError>, request_id: RequestId) -> ApiError {
    let code = ErrorCode::from(report.current_context());
    if code.status().is_server_error() {
        tracing::error!(error = %report, %request_id, "OIDC login failed");
    } else {
        tracing::warn!(error = %report, %request_id, "OIDC login rejected");
    }
    ApiError::new(code, request_id)
}

/// Starts a login by redirecting to the provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let redirect = broker(&state, request_id)?
        .begin_login(&provider)
        .await
        .map_err(|report| broker_error(&report, request_id))?;

    let cookie = Cookie::build((STATE_COOKIE, redirect.csrf))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(STATE_COOKIE_MINUTES));

    Ok((jar.add(cookie), Redirect::to(&redirect.authorization_url)))
}

/// Completes a login and issues a local token.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let csrf = jar.get(STATE_COOKIE).map(|cookie| cookie.value().to_string());
    let issued: IssuedToken = broker(&state, request_id)?
        .complete_login(&provider, &query.code, &query.state, csrf.as_deref())
        .await
        .map_err(|report| broker_error(&report, request_id))?;

    let token_cookie = Cookie::build((TOKEN_COOKIE, issued.token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::hours(TOKEN_TTL_HOURS));
    let jar = jar
        .add(token_cookie)
        .remove(Cookie::build(STATE_COOKIE).path("/"));

    Ok((jar, Json(issued)))
}

/// Publishes the token signing key.
pub async fn jwks(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Jwks>, ApiError> {
    Ok(Json(broker(&state, request_id)?.jwks()))
}
