//! Per-tenant key/value settings and user-defined custom field definitions.
//! Settings upsert on (company_id, setting_key).

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

pub const FIELD_TYPES: &[&str] = &["text", "number", "date", "boolean", "select"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Setting {
    pub id: i64,
    pub company_id: i64,
    pub setting_key: String,
    pub setting_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomField {
    pub id: i64,
    pub company_id: i64,
    pub entity: String,
    pub name: String,
    pub field_type: String,
    pub is_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SETTING_COLUMNS: &str =
    "id, company_id, setting_key, setting_value, created_at, updated_at";
const FIELD_COLUMNS: &str =
    "id, company_id, entity, name, field_type, is_required, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct PutSetting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub entity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomField {
    pub entity: String,
    pub name: String,
    pub field_type: String,
    pub is_required: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomField {
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub is_required: Option<bool>,
}

fn validate_field_type(field_type: &str) -> Result<(), ApiError> {
    if !FIELD_TYPES.contains(&field_type) {
        return Err(ApiError::field_error(
            "field_type",
            format!("Field type must be one of: {}", FIELD_TYPES.join(", ")),
        ));
    }
    Ok(())
}

/// GET /api/settings - all settings for the caller's tenant
pub async fn list_settings(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Setting>> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM system_settings WHERE company_id = $1 ORDER BY setting_key ASC",
        SETTING_COLUMNS
    );
    let rows = sqlx::query_as::<_, Setting>(&sql)
        .bind(user.company_id)
        .fetch_all(&pool)
        .await?;
    Ok(ApiResponse::success(rows))
}

/// PUT /api/settings - upsert one key
pub async fn put_setting(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PutSetting>,
) -> ApiResult<Setting> {
    let key = require_field("key", &payload.key)?;

    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        r#"
        INSERT INTO system_settings (company_id, setting_key, setting_value)
        VALUES ($1, $2, $3)
        ON CONFLICT (company_id, setting_key)
        DO UPDATE SET setting_value = EXCLUDED.setting_value
        RETURNING {}
        "#,
        SETTING_COLUMNS
    );
    let setting = sqlx::query_as::<_, Setting>(&sql)
        .bind(user.company_id)
        .bind(&key)
        .bind(&payload.value)
        .fetch_one(&pool)
        .await?;
    Ok(ApiResponse::success(setting))
}

/// DELETE /api/settings/:key
pub async fn delete_setting(
    Extension(user): Extension<AuthUser>,
    Path(key): Path<String>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "DELETE FROM system_settings WHERE company_id = $1 AND setting_key = $2",
    )
    .bind(user.company_id)
    .bind(&key)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Setting not found"));
    }
    Ok(ApiResponse::message("Setting deleted"))
}

/// GET /api/custom-fields
pub async fn list_fields(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<FieldListQuery>,
) -> ApiResult<Vec<CustomField>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(entity) = query.entity.as_deref().filter(|s| !s.is_empty()) {
        wb.and("entity = $?", json!(entity));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM custom_fields {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM custom_fields {} ORDER BY entity ASC, name ASC LIMIT {} OFFSET {}",
        FIELD_COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<CustomField> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// POST /api/custom-fields
pub async fn create_field(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateCustomField>,
) -> ApiResult<CustomField> {
    let entity = require_field("entity", &payload.entity)?;
    let name = require_field("name", &payload.name)?;
    validate_field_type(&payload.field_type)?;

    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        r#"
        INSERT INTO custom_fields (company_id, entity, name, field_type, is_required)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        FIELD_COLUMNS
    );
    let field = sqlx::query_as::<_, CustomField>(&sql)
        .bind(user.company_id)
        .bind(&entity)
        .bind(&name)
        .bind(&payload.field_type)
        .bind(payload.is_required.unwrap_or(false))
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(field))
}

/// PATCH /api/custom-fields/:id
pub async fn update_field(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCustomField>,
) -> ApiResult<CustomField> {
    let mut ub = UpdateBuilder::new();
    if let Some(name) = payload.name {
        ub.set("name", json!(require_field("name", &name)?));
    }
    if let Some(field_type) = payload.field_type {
        validate_field_type(&field_type)?;
        ub.set("field_type", json!(field_type));
    }
    if let Some(is_required) = payload.is_required {
        ub.set("is_required", json!(is_required));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE custom_fields SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        FIELD_COLUMNS
    );
    let field: CustomField = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Custom field not found"))?;
    Ok(ApiResponse::success(field))
}

/// DELETE /api/custom-fields/:id - soft delete
pub async fn delete_field(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE custom_fields SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Custom field not found"));
    }
    Ok(ApiResponse::message("Custom field deleted"))
}
