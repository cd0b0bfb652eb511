use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
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
pub struct Department {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, name, description, manager_id, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartment {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
}

/// GET /api/departments
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Department>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and("name ILIKE $?", json!(format!("%{}%", search.trim())));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM departments {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM departments {} ORDER BY name ASC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Department> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/departments/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Department> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM departments WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let department = sqlx::query_as::<_, Department>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Department not found"))?;
    Ok(ApiResponse::success(department))
}

/// POST /api/departments
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateDepartment>,
) -> ApiResult<Department> {
    let name = require_field("name", &payload.name)?;

    let pool = DatabaseManager::pool().await?;
    if let Some(manager_id) = payload.manager_id {
        assert_tenant_row(&pool, "employees", manager_id, user.company_id, "manager_id").await?;
    }

    let sql = format!(
        "INSERT INTO departments (company_id, name, description, manager_id) \
         VALUES ($1, $2, $3, $4) RETURNING {}",
        COLUMNS
    );
    let department = sqlx::query_as::<_, Department>(&sql)
        .bind(user.company_id)
        .bind(&name)
        .bind(&payload.description)
        .bind(payload.manager_id)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(department))
}

/// PATCH /api/departments/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDepartment>,
) -> ApiResult<Department> {
    let pool = DatabaseManager::pool().await?;

    let mut ub = UpdateBuilder::new();
    if let Some(name) = payload.name {
        ub.set("name", json!(require_field("name", &name)?));
    }
    if let Some(description) = payload.description {
        ub.set("description", json!(description));
    }
    if let Some(manager_id) = payload.manager_id {
        assert_tenant_row(&pool, "employees", manager_id, user.company_id, "manager_id").await?;
        ub.set("manager_id", json!(manager_id));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE departments SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let department: Department = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Department not found"))?;
    Ok(ApiResponse::success(department))
}

/// DELETE /api/departments/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE departments SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Department not found"));
    }
    Ok(ApiResponse::message("Department deleted"))
}
