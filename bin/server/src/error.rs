//! Client-facing error catalog.
//!
//! Domain errors from the library crates are mapped onto [`ErrorCode`]s here
//! and nowhere else. Responses carry only the code, its fixed message and
//! the request id; the full report is logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use backbone_access::{BrokerError, SessionError};
use backbone_core::RequestId;
use serde::Serialize;

/// Every error a client can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UserNotLoggedIn,
    CannotExtractSessionInfo,
    SessionExpired,
    WrongCredentials,
    MalformedRequest,
    ProviderNotFound,
    EncryptState,
    DecryptState,
    ExtractStateFromCookie,
    StateMismatch,
    TokenExchange,
    IdTokenMissing,
    VerifyToken,
    ExtractClaims,
    TokenSign,
    ProviderUnavailable,
    GetUserRoles,
    NotConfigured,
}

impl ErrorCode {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotLoggedIn => "ERR.01.001",
            Self::CannotExtractSessionInfo => "ERR.01.002",
            Self::SessionExpired => "ERR.01.003",
            Self::WrongCredentials => "ERR.01.004",
            Self::MalformedRequest => "ERR.01.005",
            Self::ProviderNotFound => "ERR.02.001",
            Self::EncryptState => "ERR.02.002",
            Self::DecryptState => "ERR.02.003",
            Self::ExtractStateFromCookie => "ERR.02.004",
            Self::StateMismatch => "ERR.02.005",
            Self::TokenExchange => "ERR.02.006",
            Self::IdTokenMissing => "ERR.02.007",
            Self::VerifyToken => "ERR.02.008",
            Self::ExtractClaims => "ERR.02.009",
            Self::TokenSign => "ERR.02.010",
            Self::ProviderUnavailable => "ERR.02.011",
            Self::GetUserRoles => "ERR.04.001",
            Self::NotConfigured => "ERR.05.001",
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::UserNotLoggedIn => "user not logged in",
            Self::CannotExtractSessionInfo => "cannot extract info from session",
            Self::SessionExpired => "session expired",
            Self::WrongCredentials => "wrong username or password",
            Self::MalformedRequest => "malformed request body",
            Self::ProviderNotFound => "provider not found",
            Self::EncryptState => "cannot encrypt state",
            Self::DecryptState => "cannot decrypt state",
            Self::ExtractStateFromCookie => "cannot extract state from cookie",
            Self::StateMismatch => "state from cookie not equal to state from query param",
            Self::TokenExchange => "failed to exchange token",
            Self::IdTokenMissing => "failed to extract ID token from response",
            Self::VerifyToken => "failed to verify ID token",
            Self::ExtractClaims => "failed to extract claims from token",
            Self::TokenSign => "failed to sign new Backbone ID token",
            Self::ProviderUnavailable => "identity provider unavailable",
            Self::GetUserRoles => "failed to get mapped user roles",
            Self::NotConfigured => "broker is not configured",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UserNotLoggedIn => StatusCode::FORBIDDEN,
            Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::WrongCredentials => StatusCode::NOT_FOUND,
            Self::MalformedRequest
            | Self::ProviderNotFound
            | Self::ExtractStateFromCookie
            | Self::IdTokenMissing => StatusCode::BAD_REQUEST,
            Self::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::CannotExtractSessionInfo
            | Self::EncryptState
            | Self::DecryptState
            | Self::StateMismatch
            | Self::TokenExchange
            | Self::VerifyToken
            | Self::ExtractClaims
            | Self::TokenSign
            | Self::GetUserRoles => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&SessionError> for ErrorCode {
    fn from(error: &SessionError) -> Self {
        match error {
            SessionError::NotLoggedIn => Self::UserNotLoggedIn,
            SessionError::Expired => Self::SessionExpired,
            SessionError::CannotExtract { .. } => Self::CannotExtractSessionInfo,
        }
    }
}

impl From<&BrokerError> for ErrorCode {
    fn from(error: &BrokerError) -> Self {
        match error {
            BrokerError::ProviderNotFound { .. } => Self::ProviderNotFound,
            BrokerError::ProviderUnavailable { .. } => Self::ProviderUnavailable,
            BrokerError::EncryptState => Self::EncryptState,
            BrokerError::DecryptState => Self::DecryptState,
            BrokerError::ExtractStateFromCookie => Self::ExtractStateFromCookie,
            BrokerError::StateMismatch => Self::StateMismatch,
            BrokerError::TokenExchange => Self::TokenExchange,
            BrokerError::IdTokenMissing => Self::IdTokenMissing,
            BrokerError::VerifyToken => Self::VerifyToken,
            BrokerError::ExtractClaims => Self::ExtractClaims,
            BrokerError::TokenSign => Self::TokenSign,
            BrokerError::UserRoles { .. } => Self::GetUserRoles,
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(rename = "errCode")]
    err_code: &'static str,
    #[serde(rename = "errMessage")]
    err_message: &'static str,
    #[serde(rename = "requestID")]
    request_id: String,
}

/// An error response for one request.
#[derive(Debug, Clone, Copy)]
pub struct ApiError {
    code: ErrorCode,
    request_id: RequestId,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, request_id: RequestId) -> Self {
        Self { code, request_id }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            err_code: self.code.code(),
            err_message: self.code.message(),
            request_id: self.request_id.to_string(),
        };
        (self.code.status(), Json(body)).into_response()
    }
}
