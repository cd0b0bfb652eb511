mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn protected_routes_require_bearer_token() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // No Authorization header
    let resp = client
        .get(format!("{}/api/employees", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["success"], false);

    // Garbage token
    let resp = client
        .get(format!("{}/api/employees", server.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_rejects_unknown_credentials() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({
            "email": "nobody@example.test",
            "password": "wrong",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_rejects_blank_email() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": "  ", "password": "whatever" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["field_errors"]["email"].is_string());
    Ok(())
}

#[tokio::test]
async fn register_then_login_round_trip() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("roundtrip");
    let resp = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&serde_json::json!({
            "company_name": "Roundtrip Co",
            "email": email,
            "password": "correct-horse-battery",
            "first_name": "Rita",
            "last_name": "Tester",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": email, "password": "correct-horse-battery" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    let token = body["data"]["token"].as_str().unwrap();
    assert_eq!(body["data"]["user"]["role"], "admin");

    // Token works against a protected route
    let resp = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["data"]["email"], email.to_lowercase());
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("dup");
    let payload = serde_json::json!({
        "company_name": "Dup Co",
        "email": email,
        "password": "correct-horse-battery",
        "first_name": "Dee",
        "last_name": "Dup",
    });

    let first = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&payload)
        .send()
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&payload)
        .send()
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    Ok(())
}
