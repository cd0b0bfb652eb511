//! The caller's own tenant row. There is no cross-tenant company listing;
//! companies are created through registration.

use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;

use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_optional_as, UpdateBuilder};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, name, email, phone, address, is_active, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// GET /api/company - the caller's tenant
pub async fn get(Extension(user): Extension<AuthUser>) -> ApiResult<Company> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM companies WHERE id = $1 AND is_deleted = FALSE",
        COLUMNS
    );
    let company = sqlx::query_as::<_, Company>(&sql)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;
    Ok(ApiResponse::success(company))
}

/// PATCH /api/company - update the caller's tenant (admin only)
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateCompany>,
) -> ApiResult<Company> {
    let mut ub = UpdateBuilder::new();
    if let Some(name) = payload.name {
        let name = crate::handlers::require_field("name", &name)?;
        ub.set("name", json!(name));
    }
    if let Some(email) = payload.email {
        ub.set("email", json!(email.trim().to_lowercase()));
    }
    if let Some(phone) = payload.phone {
        ub.set("phone", json!(phone));
    }
    if let Some(address) = payload.address {
        ub.set("address", json!(address));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE companies SET {} WHERE id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        COLUMNS
    );
    let company: Company = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;
    Ok(ApiResponse::success(company))
}
