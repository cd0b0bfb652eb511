//! Calendar events with participant join rows. Creating an event inserts the
//! event plus one join row per participant in a single transaction.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, Row};

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::require_field;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, title, description, location, starts_at, ends_at, \
                       created_by, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub participant_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

async fn participant_ids_for(
    pool: &sqlx::PgPool,
    event_id: i64,
) -> Result<Vec<i64>, ApiError> {
    let rows = sqlx::query(
        "SELECT employee_id FROM event_participants WHERE event_id = $1 ORDER BY employee_id ASC",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        ids.push(row.try_get::<i64, _>("employee_id")?);
    }
    Ok(ids)
}

/// GET /api/events
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Event>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(from) = query.from {
        wb.and("starts_at >= $?::timestamptz", json!(from.to_rfc3339()));
    }
    if let Some(to) = query.to {
        wb.and("starts_at <= $?::timestamptz", json!(to.to_rfc3339()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and("title ILIKE $?", json!(format!("%{}%", search.trim())));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM events {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM events {} ORDER BY starts_at ASC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Event> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/events/:id - event plus participant employee ids
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM events WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let event = sqlx::query_as::<_, Event>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let participant_ids = participant_ids_for(&pool, event.id).await?;
    Ok(ApiResponse::success(json!({
        "event": event,
        "participant_ids": participant_ids,
    })))
}

/// POST /api/events - event plus join rows in one transaction
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateEvent>,
) -> ApiResult<Value> {
    let title = require_field("title", &payload.title)?;
    if let Some(ends_at) = payload.ends_at {
        if ends_at < payload.starts_at {
            return Err(ApiError::field_error("ends_at", "Cannot be before starts_at"));
        }
    }

    let mut participant_ids = payload.participant_ids.clone();
    participant_ids.sort_unstable();
    participant_ids.dedup();

    let pool = DatabaseManager::pool().await?;

    // All participants must be employees of the caller's tenant
    if !participant_ids.is_empty() {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM employees \
             WHERE id = ANY($1) AND company_id = $2 AND is_deleted = FALSE",
        )
        .bind(&participant_ids)
        .bind(user.company_id)
        .fetch_one(&pool)
        .await?;
        let found: i64 = row.try_get("count")?;
        if found != participant_ids.len() as i64 {
            return Err(ApiError::field_error("participant_ids", "Unknown identifier"));
        }
    }

    let mut tx = pool.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO events (company_id, title, description, location, starts_at, ends_at, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let event = sqlx::query_as::<_, Event>(&sql)
        .bind(user.company_id)
        .bind(&title)
        .bind(&payload.description)
        .bind(&payload.location)
        .bind(payload.starts_at)
        .bind(payload.ends_at)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

    for employee_id in &participant_ids {
        sqlx::query("INSERT INTO event_participants (event_id, employee_id) VALUES ($1, $2)")
            .bind(event.id)
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(ApiResponse::created(json!({
        "event": event,
        "participant_ids": participant_ids,
    })))
}

/// PATCH /api/events/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateEvent>,
) -> ApiResult<Event> {
    let mut ub = UpdateBuilder::new();
    if let Some(title) = payload.title {
        ub.set("title", json!(require_field("title", &title)?));
    }
    if let Some(description) = payload.description {
        ub.set("description", json!(description));
    }
    if let Some(location) = payload.location {
        ub.set("location", json!(location));
    }
    if let Some(starts_at) = payload.starts_at {
        ub.set_with("\"starts_at\" = $?::timestamptz", json!(starts_at.to_rfc3339()));
    }
    if let Some(ends_at) = payload.ends_at {
        ub.set_with("\"ends_at\" = $?::timestamptz", json!(ends_at.to_rfc3339()));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE events SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let event: Event = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;
    Ok(ApiResponse::success(event))
}

/// DELETE /api/events/:id - soft delete; join rows stay for the audit trail
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE events SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Event not found"));
    }
    Ok(ApiResponse::message("Event deleted"))
}
