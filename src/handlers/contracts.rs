//! Employment contracts. Contract numbers are derived from the tenant's row
//! count inside the insert transaction, so the read and the write commit
//! together.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::{assert_tenant_row, format_reference, next_sequence, parse_decimal, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Contract {
    pub id: i64,
    pub company_id: i64,
    pub employee_id: i64,
    pub contract_number: String,
    pub contract_type: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub salary: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, employee_id, contract_number, contract_type, start_date, \
                       end_date, salary, status, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub employee_id: Option<i64>,
    pub status: Option<String>,
    pub contract_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateContract {
    pub employee_id: i64,
    pub contract_type: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub salary: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContract {
    pub contract_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub salary: Option<String>,
    pub status: Option<String>,
}

/// GET /api/contracts
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Contract>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(contract_type) = query.contract_type.as_deref().filter(|s| !s.is_empty()) {
        wb.and("contract_type = $?", json!(contract_type));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM contracts {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM contracts {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Contract> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/contracts/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Contract> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM contracts WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let contract = sqlx::query_as::<_, Contract>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Contract not found"))?;
    Ok(ApiResponse::success(contract))
}

/// POST /api/contracts - generates the contract number inside the transaction
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateContract>,
) -> ApiResult<Contract> {
    let contract_type = require_field("contract_type", &payload.contract_type)?;
    let salary = parse_decimal("salary", &payload.salary)?;
    if salary < BigDecimal::from(0) {
        return Err(ApiError::field_error("salary", "Must be non-negative"));
    }
    if let Some(end_date) = payload.end_date {
        if end_date < payload.start_date {
            return Err(ApiError::field_error("end_date", "Cannot be before start_date"));
        }
    }

    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "employees", payload.employee_id, user.company_id, "employee_id").await?;

    let mut tx = pool.begin().await?;
    let sequence = next_sequence(&mut tx, "contracts", user.company_id).await?;
    let contract_number = format_reference("CT", sequence);

    let sql = format!(
        r#"
        INSERT INTO contracts
            (company_id, employee_id, contract_number, contract_type, start_date, end_date, salary)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let contract = sqlx::query_as::<_, Contract>(&sql)
        .bind(user.company_id)
        .bind(payload.employee_id)
        .bind(&contract_number)
        .bind(&contract_type)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .bind(&salary)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::created(contract))
}

/// PATCH /api/contracts/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateContract>,
) -> ApiResult<Contract> {
    let mut ub = UpdateBuilder::new();
    if let Some(contract_type) = payload.contract_type {
        ub.set("contract_type", json!(require_field("contract_type", &contract_type)?));
    }
    if let Some(start_date) = payload.start_date {
        ub.set_with("\"start_date\" = $?::date", json!(start_date.to_string()));
    }
    if let Some(end_date) = payload.end_date {
        ub.set_with("\"end_date\" = $?::date", json!(end_date.to_string()));
    }
    if let Some(salary) = payload.salary {
        let salary = parse_decimal("salary", &salary)?;
        ub.set_with("\"salary\" = $?::numeric", json!(salary.to_string()));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE contracts SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let contract: Contract = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Contract not found"))?;
    Ok(ApiResponse::success(contract))
}

/// DELETE /api/contracts/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE contracts SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Contract not found"));
    }
    Ok(ApiResponse::message("Contract deleted"))
}
