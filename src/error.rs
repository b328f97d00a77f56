use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GarnerError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Backend error with status {status}: {message}")]
    Backend { status: StatusCode, message: String },

    #[error("Missing PKCE code verifier cookie")]
    MissingCodeVerifier,

    #[error("No session; sign in first")]
    MissingSession,

    #[error("Invalid session cookie: {0}")]
    InvalidSessionCookie(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Dashboard view not found")]
    ViewNotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Too many sync requests")]
    RateLimited,
}

impl GarnerError {
    /// Build a [`GarnerError::Backend`] from a non-success response, keeping the
    /// most specific message the platform returned.
    pub async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let message = match resp.json::<BackendErrorBody>().await {
            Ok(body) => body.into_message(),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        GarnerError::Backend { status, message }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            GarnerError::Backend { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

impl IntoResponse for GarnerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            GarnerError::ViewNotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Dashboard view not found.",
            ),
            GarnerError::MissingSession
            | GarnerError::MissingCodeVerifier
            | GarnerError::InvalidSessionCookie(_)
            | GarnerError::Base64(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication error.",
            ),
            err if err.is_unauthorized() => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Backend rejected the session.",
            ),
            GarnerError::Backend { .. }
            | GarnerError::Reqwest(_)
            | GarnerError::UrlParse(_)
            | GarnerError::Json(_) => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "Backend service is unavailable.",
            ),
            GarnerError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests; try again shortly.",
            ),
            GarnerError::RactorError(_) | GarnerError::Config(_) | GarnerError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.",
            ),
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Error payloads of the backend: the auth service answers with
/// `{error, error_description}` or `{code, msg}`, the rest service with
/// `{code, message, details, hint}`.
#[derive(Deserialize, Debug, Default)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl BackendErrorBody {
    pub fn into_message(self) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .or_else(|| self.code.map(|c| c.to_string()))
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
