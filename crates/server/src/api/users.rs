//! User registration endpoint.

use crate::AppResources;
use crate::api::auth::ApiError;
use crate::credentials;
use crate::entity::user;
use crate::store::Filter;
use axum::{Extension, Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const USERS_TAG: &str = "Users";

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Defaults to the email address when omitted
    #[serde(default)]
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Unix seconds
    pub created_at: i64,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            created_at: model.created_at.unix_timestamp(),
        }
    }
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/users",
    tag = USERS_TAG,
    operation_id = "Create User",
    summary = "Create a user with a password",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Email or password missing", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    )
)]
pub async fn create_user(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let email = payload.email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::invalid_request("email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::invalid_request("password is required"));
    }

    let users = &resources.repos.users;
    let existing = users
        .find_one(&Filter::new().eq("email", email.as_str()))
        .await
        .map_err(|e| {
            tracing::error!("Database error looking up user: {}", e);
            ApiError::server_error()
        })?;
    if existing.is_some() {
        return Err(ApiError::conflict("email is already registered"));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || credentials::hash(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            ApiError::server_error()
        })?
        .map_err(|e| {
            tracing::error!("{}", e);
            ApiError::server_error()
        })?;

    let now = OffsetDateTime::now_utc();
    let username = if payload.username.trim().is_empty() {
        email.clone()
    } else {
        payload.username.trim().to_string()
    };
    let model = user::Model {
        id: uuid::Uuid::new_v4().to_string(),
        username,
        email,
        password_hash,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&model).await.map_err(|e| {
        if e.is_unique_violation() {
            // Lost a race with a concurrent registration
            return ApiError::conflict("email is already registered");
        }
        tracing::error!("Database error creating user: {}", e);
        ApiError::server_error()
    })?;

    tracing::info!(user_id = %model.id, "Created user");
    Ok((StatusCode::CREATED, Json(model.into())))
}
