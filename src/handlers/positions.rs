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
use crate::handlers::require_field;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Position {
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, title, description, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePosition {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePosition {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// GET /api/positions
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Position>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and("title ILIKE $?", json!(format!("%{}%", search.trim())));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM positions {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM positions {} ORDER BY title ASC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Position> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/positions/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Position> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM positions WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let position = sqlx::query_as::<_, Position>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Position not found"))?;
    Ok(ApiResponse::success(position))
}

/// POST /api/positions
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePosition>,
) -> ApiResult<Position> {
    let title = require_field("title", &payload.title)?;

    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "INSERT INTO positions (company_id, title, description) VALUES ($1, $2, $3) RETURNING {}",
        COLUMNS
    );
    let position = sqlx::query_as::<_, Position>(&sql)
        .bind(user.company_id)
        .bind(&title)
        .bind(&payload.description)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(position))
}

/// PATCH /api/positions/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePosition>,
) -> ApiResult<Position> {
    let mut ub = UpdateBuilder::new();
    if let Some(title) = payload.title {
        ub.set("title", json!(require_field("title", &title)?));
    }
    if let Some(description) = payload.description {
        ub.set("description", json!(description));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE positions SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let position: Position = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Position not found"))?;
    Ok(ApiResponse::success(position))
}

/// DELETE /api/positions/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE positions SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Position not found"));
    }
    Ok(ApiResponse::message("Position deleted"))
}
