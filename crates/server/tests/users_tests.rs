//! User creation endpoint tests.

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{bootstrapped_resources, test_server};
use keyloom::entity::user;
use keyloom::store::{Filter, Order, Repository, StoreError};
use serde_json::json;
use std::sync::Arc;

/// Never sees an existing user, as if another request inserted it after the lookup.
struct StaleLookups {
    inner: Arc<dyn Repository<user::Model>>,
}

#[async_trait]
impl Repository<user::Model> for StaleLookups {
    async fn find_one(&self, _filter: &Filter) -> Result<Option<user::Model>, StoreError> {
        Ok(None)
    }

    async fn find_many(
        &self,
        filter: &Filter,
        order: Option<Order>,
    ) -> Result<Vec<user::Model>, StoreError> {
        self.inner.find_many(filter, order).await
    }

    async fn insert_one(&self, record: &user::Model) -> Result<(), StoreError> {
        self.inner.insert_one(record).await
    }

    async fn update_one(&self, record: &user::Model) -> Result<bool, StoreError> {
        self.inner.update_one(record).await
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_one(id).await
    }
}

#[tokio::test]
async fn test_create_user_stores_hash_and_can_log_in() {
    let resources = bootstrapped_resources().await;
    let users = resources.repos.users.clone();
    let server = test_server(resources);

    let response = server
        .post("/users")
        .json(&json!({
            "username": "alice",
            "email": "alice@keyloom.test",
            "password": "wonderland"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@keyloom.test");
    assert!(body.get("password_hash").is_none());

    let stored = users
        .find_one(&Filter::new().eq("email", "alice@keyloom.test"))
        .await
        .expect("lookup")
        .expect("user stored");
    assert_eq!(body["id"], stored.id.as_str());
    assert_ne!(stored.password_hash, "wonderland");
    assert!(stored.password_hash.starts_with("$argon2"));

    let token = server
        .post("/token")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice@keyloom.test"),
            ("password", "wonderland"),
        ])
        .await;
    token.assert_status_ok();
}

#[tokio::test]
async fn test_username_defaults_to_email() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/users")
        .json(&json!({ "email": "bob@keyloom.test", "password": "builder" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "bob@keyloom.test");
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/users")
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": "another" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_password_is_bad_request() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/users")
        .json(&json!({ "email": "carol@keyloom.test", "password": "" }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_unique_index_violation_conflicts() {
    let mut resources = bootstrapped_resources().await;
    let users = resources.repos.users.clone();
    resources.repos.users = Arc::new(StaleLookups {
        inner: users.clone(),
    });
    let server = test_server(resources);

    let response = server
        .post("/users")
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": "another" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let stored = users
        .find_many(&Filter::new().eq("email", common::ADMIN_EMAIL), None)
        .await
        .expect("lookup");
    assert_eq!(stored.len(), 1);
}
