//! backbone HTTP server.
//!
//! Mounts the authentication front-end selected by the process mode on top
//! of a [`ResourceSyncEngine`](backbone_sync::ResourceSyncEngine) snapshot
//! and the live broker configuration.

pub mod auth;
pub mod config;
pub mod error;
pub mod request_id;
pub mod startup;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use backbone_sync::Mode;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::AppState;

/// Builds the router for the state's mode.
///
/// - `SESSIONS`: `/auth/sessions/*` and `/main/ping`
/// - `OIDC_BROKER`: `/auth/oidc/{provider}/*` and `/well-known/jwks`
/// - `OIDC_SERVER`: no authentication routes
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = match state.mode() {
        Mode::Sessions => {
            let protected = Router::new()
                .route("/auth/sessions/userinfo", get(auth::sessions::userinfo))
                .route("/auth/sessions/validate", get(auth::sessions::validate))
                .route("/main/ping", get(auth::sessions::ping))
                .route_layer(from_fn_with_state(state.clone(), auth::require_session));

            Router::new()
                .route("/auth/sessions/login", post(auth::sessions::login))
                .route("/auth/sessions/logout", get(auth::sessions::logout))
                .merge(protected)
        }
        Mode::OidcBroker => Router::new()
            .route("/auth/oidc/{provider}/login", get(auth::broker::login))
            .route("/auth/oidc/{provider}/callback", get(auth::broker::callback))
            .route("/well-known/jwks", get(auth::broker::jwks)),
        Mode::OidcServer => Router::new(),
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id::assign_request_id))
}
