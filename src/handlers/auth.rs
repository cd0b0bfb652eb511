//! Public authentication endpoints (login, tenant registration) and the
//! authenticated whoami probe.

use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::auth::{generate_jwt, generate_salt, hash_password, verify_password, Claims};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::{map_unique_violation, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub company_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// POST /auth/login - authenticate with email + password, receive a JWT
///
/// The token carries the user's company id and role; all protected routes
/// derive tenant scoping from it.
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<Value> {
    let email = require_field("email", &payload.email)?.to_lowercase();
    if payload.password.is_empty() {
        return Err(ApiError::field_error("password", "This field is required"));
    }

    let pool = DatabaseManager::pool().await?;

    let row = sqlx::query(
        r#"
        SELECT u.id, u.company_id, u.email, u.role, u.password_hash, u.password_salt,
               u.first_name, u.last_name, u.is_active, c.is_active AS company_active
        FROM users u
        JOIN companies c ON c.id = u.company_id
        WHERE u.email = $1 AND u.is_deleted = FALSE AND c.is_deleted = FALSE
        "#,
    )
    .bind(&email)
    .fetch_optional(&pool)
    .await?;

    // Identical message for unknown email and wrong password
    let row = row.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let password_hash: String = row.try_get("password_hash")?;
    let password_salt: String = row.try_get("password_salt")?;
    if !verify_password(&payload.password, &password_salt, &password_hash) {
        tracing::warn!("Failed login attempt for {}", email);
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let is_active: bool = row.try_get("is_active")?;
    let company_active: bool = row.try_get("company_active")?;
    if !is_active || !company_active {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    let user_id: i64 = row.try_get("id")?;
    let company_id: i64 = row.try_get("company_id")?;
    let role: String = row.try_get("role")?;
    let first_name: String = row.try_get("first_name")?;
    let last_name: String = row.try_get("last_name")?;

    let claims = Claims::new(user_id, company_id, email.clone(), role.clone());
    let token = generate_jwt(claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    let expires_in = config::config().security.jwt_expiry_hours * 3600;

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": {
            "id": user_id,
            "email": email,
            "role": role,
            "company_id": company_id,
            "first_name": first_name,
            "last_name": last_name,
        },
        "expires_in": expires_in,
    })))
}

/// POST /auth/register - create a company plus its admin user
///
/// The company row and the admin user row are inserted in one transaction;
/// either both exist afterwards or neither does.
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<Value> {
    let company_name = require_field("company_name", &payload.company_name)?;
    let email = require_field("email", &payload.email)?.to_lowercase();
    let first_name = require_field("first_name", &payload.first_name)?;
    let last_name = require_field("last_name", &payload.last_name)?;
    if payload.password.len() < 8 {
        return Err(ApiError::field_error(
            "password",
            "Password must be at least 8 characters",
        ));
    }

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let company_row = sqlx::query(
        "INSERT INTO companies (name, email) VALUES ($1, $2) RETURNING id",
    )
    .bind(&company_name)
    .bind(&email)
    .fetch_one(&mut *tx)
    .await?;
    let company_id: i64 = company_row.try_get("id")?;

    let salt = generate_salt();
    let password_hash = hash_password(&payload.password, &salt);

    let user_row = sqlx::query(
        r#"
        INSERT INTO users (company_id, email, password_hash, password_salt, role, first_name, last_name)
        VALUES ($1, $2, $3, $4, 'admin', $5, $6)
        RETURNING id
        "#,
    )
    .bind(company_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&salt)
    .bind(&first_name)
    .bind(&last_name)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "Email is already registered"))?;
    let user_id: i64 = user_row.try_get("id")?;

    tx.commit().await?;
    tracing::info!("Registered company {} ({})", company_name, company_id);

    let claims = Claims::new(user_id, company_id, email.clone(), "admin".to_string());
    let token = generate_jwt(claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    Ok(ApiResponse::created(json!({
        "token": token,
        "company": { "id": company_id, "name": company_name },
        "user": {
            "id": user_id,
            "email": email,
            "role": "admin",
            "company_id": company_id,
        },
    })))
}

/// GET /api/auth/whoami - echo the authenticated caller
pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "id": user.user_id,
        "email": user.email,
        "role": user.role,
        "company_id": user.company_id,
    })))
}
