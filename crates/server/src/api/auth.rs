//! Bearer authentication and API error responses.
//!
//! Authentication failures are deliberately uniform: callers learn that a
//! token or credential was rejected, never why.

use crate::AppResources;
use crate::dispatch::DispatchError;
use crate::tokens::VerifiedToken;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code (e.g., "invalid_token", "unsupported_grant_type")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ApiError {
    fn new(error: &str, description: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description,
        }
    }

    pub fn invalid_token() -> Self {
        Self::new("invalid_token", None)
    }

    pub fn invalid_credentials() -> Self {
        Self::new("invalid_credentials", Some("invalid credentials".to_string()))
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new("invalid_request", Some(description.into()))
    }

    pub fn unsupported_grant_type() -> Self {
        Self::new("unsupported_grant_type", None)
    }

    pub fn not_implemented(description: impl Into<String>) -> Self {
        Self::new("not_implemented", Some(description.into()))
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::new("conflict", Some(description.into()))
    }

    pub fn server_error() -> Self {
        Self::new("server_error", None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "invalid_token" | "invalid_credentials" => StatusCode::UNAUTHORIZED,
            "invalid_request" | "unsupported_grant_type" => StatusCode::BAD_REQUEST,
            "not_implemented" => StatusCode::NOT_IMPLEMENTED,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::UNAUTHORIZED && self.error == "invalid_token" {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(self),
            )
                .into_response();
        }
        (status, Json(self)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::MissingGrantType => ApiError::invalid_request("grant_type is required"),
            DispatchError::InvalidRequest(field) => {
                ApiError::invalid_request(format!("{field} is required"))
            }
            DispatchError::UnsupportedGrantType(_) => ApiError::unsupported_grant_type(),
            DispatchError::GrantNotImplemented(grant) => {
                ApiError::not_implemented(format!("{grant} grant is not implemented"))
            }
            DispatchError::InvalidCredentials => ApiError::invalid_credentials(),
            DispatchError::Store(e) => {
                tracing::error!("Store error during token dispatch: {}", e);
                ApiError::server_error()
            }
            DispatchError::Token(e) => {
                tracing::error!("Token issuance failed: {}", e);
                ApiError::server_error()
            }
        }
    }
}

/// Axum extractor that validates `Authorization: Bearer <token>`.
///
/// Verification uses the [`crate::tokens::TokenService`] from the
/// [`AppResources`] extension; every failure is rejected as `invalid_token`.
///
/// # Example
///
/// ```ignore
/// async fn handler(BearerAuth(token): BearerAuth) -> impl IntoResponse {
///     format!("Hello, {}", token.claims.sub)
/// }
/// ```
pub struct BearerAuth(pub VerifiedToken);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                ApiError::server_error()
            })?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                tracing::debug!("Missing or non-bearer Authorization header");
                ApiError::invalid_token()
            })?;

        match resources.tokens.verify(token) {
            Ok(verified) => Ok(BearerAuth(verified)),
            Err(e) if e.is_invalid_token() => {
                tracing::debug!("Rejected bearer token: {}", e);
                Err(ApiError::invalid_token())
            }
            Err(e) => {
                tracing::error!("Token verification unavailable: {}", e);
                Err(ApiError::server_error())
            }
        }
    }
}
