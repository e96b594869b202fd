use goose::prelude::*;
use std::env;

struct Session {
    access_token: String,
}

fn credentials() -> (String, String) {
    let email = env::var("LOADTEST_EMAIL").unwrap_or_else(|_| "admin@keyloom.local".to_string());
    let password = env::var("LOADTEST_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    (email, password)
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn issue_token(user: &mut GooseUser) -> TransactionResult {
    let (email, password) = credentials();
    let params = [
        ("grant_type", "password"),
        ("username", email.as_str()),
        ("password", password.as_str()),
    ];
    let goose = user.post_form("/token", &params).await?;

    if let Ok(response) = goose.response {
        if let Ok(body) = response.json::<serde_json::Value>().await {
            if let Some(token) = body.get("access_token").and_then(|t| t.as_str()) {
                user.set_session_data(Session {
                    access_token: token.to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn validate_token(user: &mut GooseUser) -> TransactionResult {
    let Some(token) = user
        .get_session_data::<Session>()
        .map(|session| session.access_token.clone())
    else {
        return Ok(());
    };

    let request_builder = user
        .get_request_builder(&GooseMethod::Get, "/token/me/validate")?
        .bearer_auth(token);
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .build();
    let _goose_metrics = user.request(goose_request).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    let (email, _) = credentials();
    println!("Authenticating load test users as: {email}");

    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("TokenLifecycle")
                .register_transaction(transaction!(issue_token).set_on_start())
                .register_transaction(transaction!(issue_token))
                .register_transaction(transaction!(validate_token)),
        )
        .execute()
        .await?;

    Ok(())
}
