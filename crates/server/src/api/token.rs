//! Token issuance and validation endpoints.

use crate::AppResources;
use crate::api::auth::{ApiError, BearerAuth};
use crate::dispatch::TokenRequest;
use crate::tokens::{AccessToken, TokenHeader};
use axum::{Extension, Form, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const TOKEN_TAG: &str = "Tokens";

/// Decoded claims of a valid token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPayload {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub header: TokenHeader,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    pub message: String,
    pub payload: TokenPayload,
}

/// Token dispatch endpoint.
#[tracing::instrument(skip(resources, request))]
#[utoipa::path(
    post,
    path = "/token",
    tag = TOKEN_TAG,
    operation_id = "Issue Token",
    summary = "Exchange credentials for an access token",
    description = "Dispatches on `grant_type`. Only the `password` grant issues tokens: \
                   `username` is the user's email address. `client_credentials` is recognized \
                   but answers 501. Wrong email and wrong password yield the same 401 response.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Token issued", body = AccessToken),
        (status = 400, description = "Missing or unsupported grant_type, or missing credentials", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 501, description = "Grant type recognized but not implemented", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    )
)]
pub async fn token(
    Extension(resources): Extension<AppResources>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<AccessToken>, ApiError> {
    let token = resources.dispatcher().dispatch(request).await?;
    Ok(Json(token))
}

/// Bearer token validation endpoint.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/token/me/validate",
    tag = TOKEN_TAG,
    operation_id = "Validate Token",
    summary = "Validate the presented bearer token",
    responses(
        (status = 200, description = "Token is valid", body = ValidationResponse),
        (status = 401, description = "Missing, malformed, expired or forged token", body = ApiError),
    ),
    security(("Authorization" = []))
)]
pub async fn validate(BearerAuth(token): BearerAuth) -> Json<ValidationResponse> {
    let claims = token.claims;
    Json(ValidationResponse {
        message: "token is valid".to_string(),
        payload: TokenPayload {
            sub: claims.sub,
            iss: claims.iss,
            aud: claims.aud,
            exp: claims.exp,
            header: token.header,
        },
    })
}
