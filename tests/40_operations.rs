mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn tickets_get_sequential_numbers_and_comments() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _) = common::register_company(&server.base_url, "tickets").await?;

    let mut numbers = Vec::new();
    for subject in ["Printer on fire", "VPN flaky"] {
        let resp = client
            .post(format!("{}/api/tickets", server.base_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "subject": subject, "priority": "high" }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = resp.json().await?;
        numbers.push(body["data"]["ticket_number"].as_str().unwrap().to_string());
    }
    // Fresh tenant: numbering starts at 1 and increments
    assert!(numbers[0].ends_with("-0001"), "got {}", numbers[0]);
    assert!(numbers[1].ends_with("-0002"), "got {}", numbers[1]);

    // Invalid priority is a validation error
    let resp = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "subject": "x", "priority": "asap" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Comment thread on the first ticket
    let body: serde_json::Value = client
        .get(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    let ticket_id = body["data"][0]["id"].as_i64().unwrap();

    let resp = client
        .post(format!("{}/api/tickets/{}/comments", server.base_url, ticket_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "Extinguished." }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = client
        .get(format!("{}/api/tickets/{}/comments", server.base_url, ticket_id))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn expense_total_is_computed_from_items() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _) = common::register_company(&server.base_url, "expenses").await?;

    let resp = client
        .post(format!("{}/api/expenses", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Conference trip",
            "expense_date": "2026-07-01",
            "items": [
                { "description": "Hotel", "quantity": "2", "unit_price": "120.00" },
                { "description": "Taxi", "unit_price": "14.50" },
            ],
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["data"]["expense"]["total"], "254.50");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    // An expense without items never lands half-written
    let resp = client
        .post(format!("{}/api/expenses", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Empty",
            "expense_date": "2026-07-01",
            "items": [],
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = client
        .get(format!("{}/api/expenses", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn role_gates_forbid_non_admin_writes() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (admin_token, _) = common::register_company(&server.base_url, "roles").await?;

    // Admin creates a plain employee-role user
    let member_email = common::unique_email("member");
    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "email": member_email,
            "password": "correct-horse-battery",
            "role": "employee",
            "first_name": "Mia",
            "last_name": "Member",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": member_email, "password": "correct-horse-battery" }))
        .send()
        .await?
        .json()
        .await?;
    let member_token = body["data"]["token"].as_str().unwrap().to_string();

    // Member cannot create users or subscriptions
    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .bearer_auth(&member_token)
        .json(&serde_json::json!({
            "email": common::unique_email("sneaky"),
            "password": "correct-horse-battery",
            "role": "admin",
            "first_name": "S",
            "last_name": "Neaky",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .get(format!("{}/api/subscriptions", server.base_url))
        .bearer_auth(&member_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // But can read employees
    let resp = client
        .get(format!("{}/api/employees", server.base_url))
        .bearer_auth(&member_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}
