mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn employee_crud_and_soft_delete_flow() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _company_id) = common::register_company(&server.base_url, "empcrud").await?;

    // Create
    let resp = client
        .post(format!("{}/api/employees", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "Ada@Example.Test",
            "hire_date": "2026-01-15",
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await?;
    let employee_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["email"], "ada@example.test");

    // List shows it with matching pagination metadata
    let body: serde_json::Value = client
        .get(format!("{}/api/employees", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    let listed = body["data"].as_array().unwrap();
    assert!(listed.iter().any(|e| e["id"].as_i64() == Some(employee_id)));
    assert_eq!(
        body["pagination"]["total"].as_i64().unwrap(),
        listed.len() as i64
    );

    // Partial update
    let resp = client
        .patch(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "status": "on_leave" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["data"]["status"], "on_leave");
    assert_eq!(body["data"]["first_name"], "Ada");

    // Empty update body is rejected
    let resp = client
        .patch(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Soft delete hides from subsequent get and list
    let resp = client
        .delete(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = client
        .get(format!("{}/api/employees", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert!(!body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["id"].as_i64() == Some(employee_id)));

    // Deleting again is a 404
    let resp = client
        .delete(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn create_requires_first_and_last_name() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token, _) = common::register_company(&server.base_url, "empval").await?;

    let resp = client
        .post(format!("{}/api/employees", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "first_name": "   ", "last_name": "Nameless" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["field_errors"]["first_name"].is_string());
    Ok(())
}

#[tokio::test]
async fn tenants_cannot_see_each_others_rows() -> Result<()> {
    if !common::integration_enabled() {
        eprintln!("OPSDESK_IT not set, skipping integration test");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (token_a, _) = common::register_company(&server.base_url, "tenant-a").await?;
    let (token_b, _) = common::register_company(&server.base_url, "tenant-b").await?;

    let resp = client
        .post(format!("{}/api/employees", server.base_url))
        .bearer_auth(&token_a)
        .json(&serde_json::json!({ "first_name": "Only", "last_name": "Mine" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await?;
    let employee_id = body["data"]["id"].as_i64().unwrap();

    // Tenant B reads 404 on tenant A's row
    let resp = client
        .get(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token_b)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // And cannot delete it either
    let resp = client
        .delete(format!("{}/api/employees/{}", server.base_url, employee_id))
        .bearer_auth(&token_b)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}
