//! Document metadata rows. File content lives in external storage keyed by
//! `storage_key`; this API only tracks the metadata.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::{assert_tenant_row, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub company_id: i64,
    pub employee_id: Option<i64>,
    pub title: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub storage_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, employee_id, title, file_name, content_type, size_bytes, \
                       storage_key, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub employee_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub title: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub employee_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub employee_id: Option<i64>,
}

/// GET /api/documents
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Document>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and(
            "(title ILIKE $? OR file_name ILIKE $?)",
            json!(format!("%{}%", search.trim())),
        );
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM documents {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM documents {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Document> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/documents/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Document> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM documents WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let document = sqlx::query_as::<_, Document>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(ApiResponse::success(document))
}

/// POST /api/documents - register metadata; storage_key is generated here
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateDocument>,
) -> ApiResult<Document> {
    let title = require_field("title", &payload.title)?;
    let file_name = require_field("file_name", &payload.file_name)?;
    if let Some(size) = payload.size_bytes {
        if size < 0 {
            return Err(ApiError::field_error("size_bytes", "Must be non-negative"));
        }
    }

    let pool = DatabaseManager::pool().await?;
    if let Some(employee_id) = payload.employee_id {
        assert_tenant_row(&pool, "employees", employee_id, user.company_id, "employee_id").await?;
    }

    let storage_key = Uuid::new_v4();
    let sql = format!(
        r#"
        INSERT INTO documents (company_id, employee_id, title, file_name, content_type, size_bytes, storage_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let document = sqlx::query_as::<_, Document>(&sql)
        .bind(user.company_id)
        .bind(payload.employee_id)
        .bind(&title)
        .bind(&file_name)
        .bind(&payload.content_type)
        .bind(payload.size_bytes)
        .bind(storage_key)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(document))
}

/// PATCH /api/documents/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDocument>,
) -> ApiResult<Document> {
    let pool = DatabaseManager::pool().await?;

    let mut ub = UpdateBuilder::new();
    if let Some(title) = payload.title {
        ub.set("title", json!(require_field("title", &title)?));
    }
    if let Some(employee_id) = payload.employee_id {
        assert_tenant_row(&pool, "employees", employee_id, user.company_id, "employee_id").await?;
        ub.set("employee_id", json!(employee_id));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE documents SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let document: Document = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(ApiResponse::success(document))
}

/// DELETE /api/documents/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE documents SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Document not found"));
    }
    Ok(ApiResponse::message("Document deleted"))
}
