//! Shared setup for integration tests: an in-memory SQLite database with
//! the full schema and resources wired the way the binary wires them.

#![allow(dead_code)]

use axum_test::TestServer;
use keyloom::AppResources;
use keyloom::api::build_router;
use keyloom::bootstrap::BootstrapSequencer;
use keyloom::config::{AdminUserConfig, AppConfig, TokenConfig};
use keyloom::store::Repositories;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

pub const ADMIN_EMAIL: &str = "admin@keyloom.test";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        token: TokenConfig {
            secret_key: TEST_SECRET.into(),
            issuer: "keyloom".into(),
            audience: "keyloom-api".into(),
            lifetime_minutes: 60,
        },
        admin: AdminUserConfig {
            email: ADMIN_EMAIL.into(),
            password: ADMIN_PASSWORD.into(),
            username: "admin".into(),
        },
    }
}

pub async fn migrated_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("run migrations");
    Arc::new(db)
}

pub async fn create_test_resources() -> AppResources {
    let db = migrated_db().await;
    AppResources::new(Arc::new(test_config()), Repositories::sea_orm(db)).expect("resources")
}

/// Resources after a completed bootstrap, so the admin user can log in.
pub async fn bootstrapped_resources() -> AppResources {
    let resources = create_test_resources().await;
    BootstrapSequencer::new(resources.bootstrap_context())
        .run()
        .await
        .expect("bootstrap");
    resources
}

pub fn test_server(resources: AppResources) -> TestServer {
    TestServer::new(build_router(resources)).expect("create test server")
}
