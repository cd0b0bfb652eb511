//! Support tickets and their comment threads. Ticket numbers are derived
//! from the tenant's row count inside the insert transaction.

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
use crate::handlers::{assert_tenant_row, format_reference, next_sequence, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

pub const PRIORITIES: &[&str] = &["low", "normal", "high", "urgent"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub company_id: i64,
    pub ticket_number: String,
    pub subject: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub requester_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketComment {
    pub id: i64,
    pub ticket_id: i64,
    pub author_id: Option<i64>,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, ticket_number, subject, description, status, priority, \
                       requester_id, assignee_id, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, ticket_id, author_id, content, is_internal, created_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicket {
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicket {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub content: String,
    pub is_internal: Option<bool>,
}

fn validate_priority(priority: &str) -> Result<(), ApiError> {
    if !PRIORITIES.contains(&priority) {
        return Err(ApiError::field_error(
            "priority",
            format!("Priority must be one of: {}", PRIORITIES.join(", ")),
        ));
    }
    Ok(())
}

/// GET /api/tickets
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Ticket>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(priority) = query.priority.as_deref().filter(|s| !s.is_empty()) {
        wb.and("priority = $?", json!(priority));
    }
    if let Some(assignee_id) = query.assignee_id {
        wb.and("assignee_id = $?", json!(assignee_id));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and(
            "(subject ILIKE $? OR ticket_number ILIKE $?)",
            json!(format!("%{}%", search.trim())),
        );
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM tickets {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM tickets {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Ticket> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/tickets/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<Ticket> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM tickets WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let ticket = sqlx::query_as::<_, Ticket>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    Ok(ApiResponse::success(ticket))
}

/// POST /api/tickets
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTicket>,
) -> ApiResult<Ticket> {
    let subject = require_field("subject", &payload.subject)?;
    let priority = payload.priority.unwrap_or_else(|| "normal".to_string());
    validate_priority(&priority)?;

    let pool = DatabaseManager::pool().await?;
    if let Some(assignee_id) = payload.assignee_id {
        assert_tenant_row(&pool, "users", assignee_id, user.company_id, "assignee_id").await?;
    }

    let mut tx = pool.begin().await?;
    let sequence = next_sequence(&mut tx, "tickets", user.company_id).await?;
    let ticket_number = format_reference("TKT", sequence);

    let sql = format!(
        r#"
        INSERT INTO tickets (company_id, ticket_number, subject, description, priority, requester_id, assignee_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let ticket = sqlx::query_as::<_, Ticket>(&sql)
        .bind(user.company_id)
        .bind(&ticket_number)
        .bind(&subject)
        .bind(&payload.description)
        .bind(&priority)
        .bind(user.user_id)
        .bind(payload.assignee_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::created(ticket))
}

/// PATCH /api/tickets/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTicket>,
) -> ApiResult<Ticket> {
    let pool = DatabaseManager::pool().await?;

    let mut ub = UpdateBuilder::new();
    if let Some(subject) = payload.subject {
        ub.set("subject", json!(require_field("subject", &subject)?));
    }
    if let Some(description) = payload.description {
        ub.set("description", json!(description));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if let Some(priority) = payload.priority {
        validate_priority(&priority)?;
        ub.set("priority", json!(priority));
    }
    if let Some(assignee_id) = payload.assignee_id {
        assert_tenant_row(&pool, "users", assignee_id, user.company_id, "assignee_id").await?;
        ub.set("assignee_id", json!(assignee_id));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE tickets SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let ticket: Ticket = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    Ok(ApiResponse::success(ticket))
}

/// DELETE /api/tickets/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE tickets SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Ticket not found"));
    }
    Ok(ApiResponse::message("Ticket deleted"))
}

/// GET /api/tickets/:id/comments
pub async fn list_comments(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<TicketComment>> {
    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "tickets", id, user.company_id, "ticket_id").await?;

    let sql = format!(
        "SELECT {} FROM ticket_comments WHERE ticket_id = $1 ORDER BY created_at ASC",
        COMMENT_COLUMNS
    );
    let comments = sqlx::query_as::<_, TicketComment>(&sql)
        .bind(id)
        .fetch_all(&pool)
        .await?;
    Ok(ApiResponse::success(comments))
}

/// POST /api/tickets/:id/comments
pub async fn create_comment(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateComment>,
) -> ApiResult<TicketComment> {
    let content = require_field("content", &payload.content)?;

    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "tickets", id, user.company_id, "ticket_id").await?;

    let sql = format!(
        r#"
        INSERT INTO ticket_comments (ticket_id, author_id, content, is_internal)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        COMMENT_COLUMNS
    );
    let comment = sqlx::query_as::<_, TicketComment>(&sql)
        .bind(id)
        .bind(user.user_id)
        .bind(&content)
        .bind(payload.is_internal.unwrap_or(false))
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(comment))
}
