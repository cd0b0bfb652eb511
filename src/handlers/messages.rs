//! Internal user-to-user messages. `box=inbox|sent` selects which side of
//! the conversation the list shows; recipients can mark messages read.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::{assert_tenant_row, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub company_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, company_id, sender_id, recipient_id, subject, body, read_at, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(rename = "box")]
    pub mailbox: Option<String>,
    pub unread: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessage {
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
}

/// GET /api/messages?box=inbox|sent
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Message>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    match query.mailbox.as_deref().unwrap_or("inbox") {
        "inbox" => {
            wb.and("recipient_id = $?", json!(user.user_id));
        }
        "sent" => {
            wb.and("sender_id = $?", json!(user.user_id));
        }
        other => {
            return Err(ApiError::field_error(
                "box",
                format!("Unknown mailbox '{}', expected inbox or sent", other),
            ));
        }
    }
    if query.unread == Some(true) {
        wb.and_raw("read_at IS NULL");
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM messages {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM messages {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Message> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/messages/:id - only sender or recipient may read
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<Message> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM messages WHERE id = $1 AND company_id = $2 \
         AND (sender_id = $3 OR recipient_id = $3) AND is_deleted = FALSE",
        COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(id)
        .bind(user.company_id)
        .bind(user.user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(ApiResponse::success(message))
}

/// POST /api/messages
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateMessage>,
) -> ApiResult<Message> {
    let subject = require_field("subject", &payload.subject)?;
    let body = require_field("body", &payload.body)?;

    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "users", payload.recipient_id, user.company_id, "recipient_id").await?;

    let sql = format!(
        r#"
        INSERT INTO messages (company_id, sender_id, recipient_id, subject, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(user.company_id)
        .bind(user.user_id)
        .bind(payload.recipient_id)
        .bind(&subject)
        .bind(&body)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(message))
}

/// POST /api/messages/:id/read - recipient marks the message as read
pub async fn mark_read(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Message> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "UPDATE messages SET read_at = now() \
         WHERE id = $1 AND company_id = $2 AND recipient_id = $3 AND is_deleted = FALSE \
         RETURNING {}",
        COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(id)
        .bind(user.company_id)
        .bind(user.user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(ApiResponse::success(message))
}

/// DELETE /api/messages/:id - soft delete, sender or recipient
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE messages SET is_deleted = TRUE \
         WHERE id = $1 AND company_id = $2 AND (sender_id = $3 OR recipient_id = $3) \
         AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .bind(user.user_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(ApiResponse::message("Message deleted"))
}
