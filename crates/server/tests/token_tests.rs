//! Token endpoint tests.
//!
//! Exercises `POST /token` and `GET /token/me/validate` through the full router.

mod common;

use axum::http::{StatusCode, header};
use common::{ADMIN_EMAIL, ADMIN_PASSWORD, bootstrapped_resources, test_server};
use keyloom::config::TokenConfig;
use keyloom::store::{Filter, Repository};
use keyloom::tokens::TokenService;
use time::{Duration, OffsetDateTime};

fn password_form(username: &str, password: &str) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "password".to_string()),
        ("username", username.to_string()),
        ("password", password.to_string()),
    ]
}

#[tokio::test]
async fn test_password_grant_issues_bearer_token() {
    let resources = bootstrapped_resources().await;
    let admin = resources
        .repos
        .users
        .find_one(&Filter::new().eq("email", ADMIN_EMAIL))
        .await
        .expect("lookup")
        .expect("admin exists");
    let server = test_server(resources);

    let before = OffsetDateTime::now_utc().unix_timestamp();
    let response = server
        .post("/token")
        .form(&password_form(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    let expires_at = body["expires_at"].as_i64().expect("expires_at");
    assert!(expires_at >= before + 3600);
    assert!(expires_at <= OffsetDateTime::now_utc().unix_timestamp() + 3600);

    let token = body["access_token"].as_str().expect("access_token");
    let validated = server
        .get("/token/me/validate")
        .authorization_bearer(token)
        .await;
    validated.assert_status_ok();
    let payload: serde_json::Value = validated.json();
    assert_eq!(payload["message"], "token is valid");
    assert_eq!(payload["payload"]["sub"], admin.id.as_str());
    assert_eq!(payload["payload"]["iss"], "keyloom");
    assert_eq!(payload["payload"]["aud"], "keyloom-api");
    assert_eq!(payload["payload"]["exp"], expires_at);
    assert_eq!(payload["payload"]["header"]["alg"], "HS256");
}

#[tokio::test]
async fn test_client_id_is_accepted_and_ignored() {
    let server = test_server(bootstrapped_resources().await);

    let mut form = password_form(ADMIN_EMAIL, ADMIN_PASSWORD);
    form.push(("client_id", "not-a-registered-client".to_string()));
    let response = server.post("/token").form(&form).await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let server = test_server(bootstrapped_resources().await);

    let wrong_password = server
        .post("/token")
        .form(&password_form(ADMIN_EMAIL, "not the password"))
        .await;
    let unknown_user = server
        .post("/token")
        .form(&password_form("nobody@keyloom.test", ADMIN_PASSWORD))
        .await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.text(), unknown_user.text());
    let body: serde_json::Value = wrong_password.json();
    assert_eq!(body["error_description"], "invalid credentials");
}

#[tokio::test]
async fn test_missing_grant_type_is_bad_request() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/token")
        .form(&[("username", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)])
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_grant_type_is_unsupported() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/token")
        .form(&[("grant_type", "bogus")])
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_client_credentials_is_not_implemented() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/token")
        .form(&[("grant_type", "client_credentials"), ("client_id", "x")])
        .await;

    response.assert_status(StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_password_grant_requires_credentials() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .post("/token")
        .form(&[("grant_type", "password"), ("username", ADMIN_EMAIL)])
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_description"], "password is required");
}

#[tokio::test]
async fn test_validate_without_header_is_unauthorized() {
    let server = test_server(bootstrapped_resources().await);

    let response = server.get("/token/me/validate").await;

    response.assert_status_unauthorized();
    assert_eq!(response.header(header::WWW_AUTHENTICATE), "Bearer");
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_validate_rejects_garbage_token() {
    let server = test_server(bootstrapped_resources().await);

    let response = server
        .get("/token/me/validate")
        .authorization_bearer("definitely.not.ajwt")
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_validate_rejects_token_signed_with_another_secret() {
    let server = test_server(bootstrapped_resources().await);
    let foreign = TokenService::new(&TokenConfig {
        secret_key: "some-other-deployment-secret-0123456789".into(),
        issuer: "keyloom".into(),
        audience: "keyloom-api".into(),
        lifetime_minutes: 60,
    })
    .expect("token service");
    let token = foreign.issue("someone").expect("issue").access_token;

    let response = server
        .get("/token/me/validate")
        .authorization_bearer(token)
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_validate_rejects_expired_token() {
    let resources = bootstrapped_resources().await;
    let issued_at = OffsetDateTime::now_utc() - Duration::hours(2);
    let token = resources
        .tokens
        .issue_at("someone", issued_at)
        .expect("issue")
        .access_token;
    let server = test_server(resources);

    let response = server
        .get("/token/me/validate")
        .authorization_bearer(token)
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_health_check() {
    let server = test_server(bootstrapped_resources().await);

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}
