//! User accounts. Creating a user also creates the matching employee row in
//! one transaction, since nearly every user of this system is staff.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, Row};

use crate::api::pagination::{page_params, pagination_meta};
use crate::auth::{generate_salt, hash_password};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::{map_unique_violation, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

pub const ROLES: &[&str] = &["admin", "manager", "employee"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub company_id: i64,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, company_id, email, role, first_name, last_name, is_active, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// GET /api/users
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<User>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(role) = query.role.as_deref().filter(|r| !r.is_empty()) {
        wb.and("role = $?", json!(role));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and(
            "(first_name ILIKE $? OR last_name ILIKE $? OR email ILIKE $?)",
            json!(format!("%{}%", search.trim())),
        );
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM users {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM users {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<User> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/users/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<User> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM users WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let row = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(row))
}

/// POST /api/users - create user account plus employee row in one transaction
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateUser>,
) -> ApiResult<Value> {
    let email = require_field("email", &payload.email)?.to_lowercase();
    let first_name = require_field("first_name", &payload.first_name)?;
    let last_name = require_field("last_name", &payload.last_name)?;
    if payload.password.len() < 8 {
        return Err(ApiError::field_error(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if !ROLES.contains(&payload.role.as_str()) {
        return Err(ApiError::field_error(
            "role",
            format!("Role must be one of: {}", ROLES.join(", ")),
        ));
    }

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let salt = generate_salt();
    let password_hash = hash_password(&payload.password, &salt);

    let user_sql = format!(
        r#"
        INSERT INTO users (company_id, email, password_hash, password_salt, role, first_name, last_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let created: User = sqlx::query_as::<_, User>(&user_sql)
        .bind(user.company_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(&salt)
        .bind(&payload.role)
        .bind(&first_name)
        .bind(&last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Email is already registered"))?;

    // Employee row depends on the generated user id
    let employee_row = sqlx::query(
        r#"
        INSERT INTO employees (company_id, user_id, first_name, last_name, email)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(user.company_id)
    .bind(created.id)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&email)
    .fetch_one(&mut *tx)
    .await?;
    let employee_id: i64 = employee_row.try_get("id")?;

    tx.commit().await?;

    Ok(ApiResponse::created(json!({
        "user": created,
        "employee_id": employee_id,
    })))
}

/// PATCH /api/users/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUser>,
) -> ApiResult<User> {
    let mut ub = UpdateBuilder::new();
    if let Some(email) = payload.email {
        let email = require_field("email", &email)?.to_lowercase();
        ub.set("email", json!(email));
    }
    if let Some(role) = payload.role {
        if !ROLES.contains(&role.as_str()) {
            return Err(ApiError::field_error(
                "role",
                format!("Role must be one of: {}", ROLES.join(", ")),
            ));
        }
        ub.set("role", json!(role));
    }
    if let Some(first_name) = payload.first_name {
        ub.set("first_name", json!(require_field("first_name", &first_name)?));
    }
    if let Some(last_name) = payload.last_name {
        ub.set("last_name", json!(require_field("last_name", &last_name)?));
    }
    if let Some(is_active) = payload.is_active {
        ub.set("is_active", json!(is_active));
    }
    if let Some(password) = payload.password {
        if password.len() < 8 {
            return Err(ApiError::field_error(
                "password",
                "Password must be at least 8 characters",
            ));
        }
        let salt = generate_salt();
        let password_hash = hash_password(&password, &salt);
        ub.set("password_hash", json!(password_hash));
        ub.set("password_salt", json!(salt));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE users SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let updated: User = fetch_optional_as(&pool, &sql, ub.params())
        .await
        .map_err(|e| match e {
            crate::database::manager::DatabaseError::Sqlx(err) => {
                map_unique_violation(err, "Email is already registered")
            }
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/users/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    if id == user.user_id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE users SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(ApiResponse::message("User deleted"))
}
