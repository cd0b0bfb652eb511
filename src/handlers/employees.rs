use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::{assert_tenant_row, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Employee {
    pub id: i64,
    pub company_id: i64,
    pub user_id: Option<i64>,
    pub employee_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub position_id: Option<i64>,
    pub hire_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, user_id, employee_code, first_name, last_name, email, \
                       phone, department_id, position_id, hire_date, status, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub department_id: Option<i64>,
    pub position_id: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub employee_code: Option<String>,
    pub department_id: Option<i64>,
    pub position_id: Option<i64>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployee {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub employee_code: Option<String>,
    pub department_id: Option<i64>,
    pub position_id: Option<i64>,
    pub hire_date: Option<NaiveDate>,
    pub status: Option<String>,
}

/// GET /api/employees - filtered, paginated list
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Employee>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(department_id) = query.department_id {
        wb.and("department_id = $?", json!(department_id));
    }
    if let Some(position_id) = query.position_id {
        wb.and("position_id = $?", json!(position_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and(
            "(first_name ILIKE $? OR last_name ILIKE $?)",
            json!(format!("%{}%", search.trim())),
        );
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM employees {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM employees {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Employee> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/employees/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Employee> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM employees WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;
    Ok(ApiResponse::success(employee))
}

/// POST /api/employees
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateEmployee>,
) -> ApiResult<Employee> {
    let first_name = require_field("first_name", &payload.first_name)?;
    let last_name = require_field("last_name", &payload.last_name)?;

    let pool = DatabaseManager::pool().await?;
    if let Some(department_id) = payload.department_id {
        assert_tenant_row(&pool, "departments", department_id, user.company_id, "department_id").await?;
    }
    if let Some(position_id) = payload.position_id {
        assert_tenant_row(&pool, "positions", position_id, user.company_id, "position_id").await?;
    }

    let sql = format!(
        r#"
        INSERT INTO employees
            (company_id, first_name, last_name, email, phone, employee_code,
             department_id, position_id, hire_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        COLUMNS
    );
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(user.company_id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(payload.email.as_deref().map(str::to_lowercase))
        .bind(&payload.phone)
        .bind(&payload.employee_code)
        .bind(payload.department_id)
        .bind(payload.position_id)
        .bind(payload.hire_date)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(employee))
}

/// PATCH /api/employees/:id - dynamic SET from supplied fields
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateEmployee>,
) -> ApiResult<Employee> {
    let pool = DatabaseManager::pool().await?;

    let mut ub = UpdateBuilder::new();
    if let Some(first_name) = payload.first_name {
        ub.set("first_name", json!(require_field("first_name", &first_name)?));
    }
    if let Some(last_name) = payload.last_name {
        ub.set("last_name", json!(require_field("last_name", &last_name)?));
    }
    if let Some(email) = payload.email {
        ub.set("email", json!(email.trim().to_lowercase()));
    }
    if let Some(phone) = payload.phone {
        ub.set("phone", json!(phone));
    }
    if let Some(employee_code) = payload.employee_code {
        ub.set("employee_code", json!(employee_code));
    }
    if let Some(department_id) = payload.department_id {
        assert_tenant_row(&pool, "departments", department_id, user.company_id, "department_id").await?;
        ub.set("department_id", json!(department_id));
    }
    if let Some(position_id) = payload.position_id {
        assert_tenant_row(&pool, "positions", position_id, user.company_id, "position_id").await?;
        ub.set("position_id", json!(position_id));
    }
    if let Some(hire_date) = payload.hire_date {
        ub.set_with("\"hire_date\" = $?::date", json!(hire_date.to_string()));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE employees SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let employee: Employee = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;
    Ok(ApiResponse::success(employee))
}

/// DELETE /api/employees/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE employees SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }
    Ok(ApiResponse::message("Employee deleted"))
}
