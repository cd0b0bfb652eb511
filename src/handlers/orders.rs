//! Customer orders (CRM side). Order numbers are count-derived like ticket
//! and contract numbers.

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
use crate::handlers::{format_reference, next_sequence, parse_decimal, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub company_id: i64,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub status: String,
    pub total: BigDecimal,
    pub order_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, order_number, customer_name, customer_email, status, \
                       total, order_date, notes, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub total: String,
    pub order_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrder {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: Option<String>,
    pub total: Option<String>,
    pub notes: Option<String>,
}

/// GET /api/orders
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Order>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and(
            "(customer_name ILIKE $? OR order_number ILIKE $?)",
            json!(format!("%{}%", search.trim())),
        );
    }
    if let Some(from) = query.from {
        wb.and("order_date >= $?::date", json!(from.to_string()));
    }
    if let Some(to) = query.to {
        wb.and("order_date <= $?::date", json!(to.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM orders {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM orders {} ORDER BY order_date DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Order> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/orders/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<Order> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(ApiResponse::success(order))
}

/// POST /api/orders
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateOrder>,
) -> ApiResult<Order> {
    let customer_name = require_field("customer_name", &payload.customer_name)?;
    let total = parse_decimal("total", &payload.total)?;
    if total < BigDecimal::from(0) {
        return Err(ApiError::field_error("total", "Must be non-negative"));
    }

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;
    let sequence = next_sequence(&mut tx, "orders", user.company_id).await?;
    let order_number = format_reference("ORD", sequence);

    let sql = format!(
        r#"
        INSERT INTO orders (company_id, order_number, customer_name, customer_email, total, order_date, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(user.company_id)
        .bind(&order_number)
        .bind(&customer_name)
        .bind(payload.customer_email.as_deref().map(str::to_lowercase))
        .bind(&total)
        .bind(payload.order_date)
        .bind(&payload.notes)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::created(order))
}

/// PATCH /api/orders/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrder>,
) -> ApiResult<Order> {
    let mut ub = UpdateBuilder::new();
    if let Some(customer_name) = payload.customer_name {
        ub.set("customer_name", json!(require_field("customer_name", &customer_name)?));
    }
    if let Some(customer_email) = payload.customer_email {
        ub.set("customer_email", json!(customer_email.trim().to_lowercase()));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if let Some(total) = payload.total {
        let total = parse_decimal("total", &total)?;
        ub.set_with("\"total\" = $?::numeric", json!(total.to_string()));
    }
    if let Some(notes) = payload.notes {
        ub.set("notes", json!(notes));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE orders SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let order: Order = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(ApiResponse::success(order))
}

/// DELETE /api/orders/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE orders SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Order not found"));
    }
    Ok(ApiResponse::message("Order deleted"))
}
