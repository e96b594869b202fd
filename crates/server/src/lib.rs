//! Keyloom: an identity provider issuing and validating signed access tokens.
//!
//! Users authenticate with the OAuth2 password grant and receive HS256
//! bearer tokens. On first start the bootstrap sequencer creates the
//! default admin user, resource server, application and grant.

use std::sync::Arc;

use crate::bootstrap::BootstrapContext;
use crate::config::AppConfig;
use crate::dispatch::TokenDispatcher;
use crate::store::Repositories;
use crate::tokens::{TokenError, TokenService};

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod entity;
pub mod store;
pub mod tokens;

/// Process-wide, read-only resources shared by every request.
#[derive(Clone)]
pub struct AppResources {
    pub config: Arc<AppConfig>,
    pub repos: Repositories,
    pub tokens: Arc<TokenService>,
}

impl AppResources {
    pub fn new(config: Arc<AppConfig>, repos: Repositories) -> Result<Self, TokenError> {
        let tokens = Arc::new(TokenService::new(&config.token)?);
        Ok(Self {
            config,
            repos,
            tokens,
        })
    }

    pub fn dispatcher(&self) -> TokenDispatcher {
        TokenDispatcher::new(self.repos.users.clone(), self.tokens.clone())
    }

    pub fn bootstrap_context(&self) -> BootstrapContext {
        BootstrapContext {
            repos: self.repos.clone(),
            admin: self.config.admin.clone(),
        }
    }
}
