//! Grant-type dispatch for the token endpoint.
//!
//! The `grant_type` form field is classified into a [`GrantType`] and each
//! variant is handled by an exhaustive match, so adding a grant type is a
//! compile-checked change.

use crate::credentials;
use crate::entity::user;
use crate::store::{Filter, Repository, StoreError};
use crate::tokens::{AccessToken, TokenError, TokenService};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use utoipa::ToSchema;

pub const PASSWORD_GRANT: &str = "password";
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantType {
    Password,
    ClientCredentials,
    Unsupported(String),
    Missing,
}

impl GrantType {
    /// Total over its input: every value maps to exactly one variant.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => GrantType::Missing,
            Some(PASSWORD_GRANT) => GrantType::Password,
            Some(CLIENT_CREDENTIALS_GRANT) => GrantType::ClientCredentials,
            Some(other) => GrantType::Unsupported(other.to_string()),
        }
    }
}

/// Form body of `POST /token`.
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// `password` is supported; `client_credentials` is recognized but not implemented
    pub grant_type: Option<String>,
    /// Email address of the user (password grant)
    pub username: Option<String>,
    /// User password (password grant)
    pub password: Option<String>,
    /// Accepted for compatibility; not checked
    pub client_id: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("grant_type is required")]
    MissingGrantType,
    #[error("Unsupported grant_type `{0}`")]
    UnsupportedGrantType(String),
    #[error("Grant type `{0}` is not implemented")]
    GrantNotImplemented(&'static str),
    #[error("{0} is required")]
    InvalidRequest(&'static str),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("User lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error("Token issuance failed: {0}")]
    Token(#[from] TokenError),
}

/// Routes token requests to the issuance strategy for their grant type.
#[derive(Clone)]
pub struct TokenDispatcher {
    users: Arc<dyn Repository<user::Model>>,
    tokens: Arc<TokenService>,
}

impl TokenDispatcher {
    pub fn new(users: Arc<dyn Repository<user::Model>>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    pub async fn dispatch(&self, request: TokenRequest) -> Result<AccessToken, DispatchError> {
        match GrantType::classify(request.grant_type.as_deref()) {
            GrantType::Password => self.password_grant(request).await,
            GrantType::ClientCredentials => {
                Err(DispatchError::GrantNotImplemented(CLIENT_CREDENTIALS_GRANT))
            }
            GrantType::Unsupported(grant_type) => {
                Err(DispatchError::UnsupportedGrantType(grant_type))
            }
            GrantType::Missing => Err(DispatchError::MissingGrantType),
        }
    }

    async fn password_grant(&self, request: TokenRequest) -> Result<AccessToken, DispatchError> {
        let username = request
            .username
            .filter(|u| !u.is_empty())
            .ok_or(DispatchError::InvalidRequest("username"))?;
        let password = request
            .password
            .filter(|p| !p.is_empty())
            .ok_or(DispatchError::InvalidRequest("password"))?;

        let found = self
            .users
            .find_one(&Filter::new().eq("email", username.as_str()))
            .await?;

        // Argon2 is CPU bound; keep it off the async workers.
        let (user, matched) = match found {
            Some(user) => {
                let hash = user.password_hash.clone();
                let matched = verification_outcome(
                    tokio::task::spawn_blocking(move || credentials::verify(&hash, &password))
                        .await,
                );
                (Some(user), matched)
            }
            None => {
                if let Err(e) = tokio::task::spawn_blocking(move || {
                    credentials::verify_against_dummy(&password)
                })
                .await
                {
                    tracing::error!("Dummy password verification task failed: {}", e);
                }
                (None, false)
            }
        };

        let Some(user) = user.filter(|_| matched) else {
            tracing::debug!("Password grant rejected");
            return Err(DispatchError::InvalidCredentials);
        };

        let token = self.tokens.issue(&user.id)?;
        tracing::info!(user_id = %user.id, "Issued access token via password grant");
        Ok(token)
    }
}

/// A verification task that did not finish counts as a mismatch.
fn verification_outcome(joined: Result<bool, JoinError>) -> bool {
    joined.unwrap_or_else(|e| {
        tracing::error!("Password verification task failed: {}", e);
        false
    })
}
