//! Signed access token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `sub`, `iss`, `aud` and `exp`. Expiry is
//! checked against an explicit clock value with zero leeway, so the same
//! code path serves both the wall clock and simulated time in tests.

use crate::config::TokenConfig;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Value of `token_type` in issued token responses.
pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token configuration is missing `{0}`")]
    ConfigurationMissing(&'static str),
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token signature is invalid")]
    SignatureInvalid,
    #[error("Token claims do not match this service: {0}")]
    ClaimMismatch(String),
    #[error("Token expired at {exp}")]
    Expired { exp: i64 },
}

impl TokenError {
    fn from_decode(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => TokenError::ClaimMismatch(err.to_string()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }

    /// Whether the failure concerns the presented token rather than this service.
    pub fn is_invalid_token(&self) -> bool {
        matches!(
            self,
            TokenError::Malformed(_)
                | TokenError::SignatureInvalid
                | TokenError::ClaimMismatch(_)
                | TokenError::Expired { .. }
        )
    }
}

/// Registered claims carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Expiration as whole-second Unix time.
    pub exp: i64,
}

/// Token issuance result, serialized as the `/token` response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessToken {
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Absolute expiration as Unix seconds
    pub expires_at: i64,
}

/// JOSE header fields exposed after verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub header: TokenHeader,
    pub claims: Claims,
}

/// Mints and verifies access tokens with the configured symmetric key.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    lifetime_secs: i64,
    validation: Validation,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Result<Self, TokenError> {
        if config.secret_key.is_empty() {
            return Err(TokenError::ConfigurationMissing("secret_key"));
        }
        if config.issuer.is_empty() {
            return Err(TokenError::ConfigurationMissing("issuer"));
        }
        if config.audience.is_empty() {
            return Err(TokenError::ConfigurationMissing("audience"));
        }
        if config.lifetime_minutes == 0 {
            return Err(TokenError::ConfigurationMissing("lifetime_minutes"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // exp is compared against the caller's clock in `verify_at`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            lifetime_secs: i64::from(config.lifetime_minutes) * 60,
            validation,
        })
    }

    /// Issue a token for `subject` valid from now.
    pub fn issue(&self, subject: &str) -> Result<AccessToken, TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    /// Issue a token for `subject` as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, now: OffsetDateTime) -> Result<AccessToken, TokenError> {
        let expires_at = now.unix_timestamp() + self.lifetime_secs;
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at,
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(AccessToken {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_at,
        })
    }

    /// Verify a presented token against the wall clock.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Verify signature, issuer and audience, then require `now < exp`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<VerifiedToken, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::from_decode)?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired {
                exp: data.claims.exp,
            });
        }

        Ok(VerifiedToken {
            header: TokenHeader {
                alg: format!("{:?}", data.header.alg),
                typ: data.header.typ,
            },
            claims: data.claims,
        })
    }
}
