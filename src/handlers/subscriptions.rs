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
use crate::handlers::{parse_decimal, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub company_id: i64,
    pub plan_name: String,
    pub status: String,
    pub seats: i32,
    pub price: BigDecimal,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, company_id, plan_name, status, seats, price, starts_on, ends_on, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscription {
    pub plan_name: String,
    pub seats: i32,
    pub price: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscription {
    pub plan_name: Option<String>,
    pub status: Option<String>,
    pub seats: Option<i32>,
    pub price: Option<String>,
    pub ends_on: Option<NaiveDate>,
}

/// GET /api/subscriptions
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Subscription>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM subscriptions {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM subscriptions {} ORDER BY starts_on DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Subscription> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/subscriptions/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Subscription> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM subscriptions WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    Ok(ApiResponse::success(subscription))
}

/// POST /api/subscriptions
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSubscription>,
) -> ApiResult<Subscription> {
    let plan_name = require_field("plan_name", &payload.plan_name)?;
    let price = parse_decimal("price", &payload.price)?;
    if payload.seats <= 0 {
        return Err(ApiError::field_error("seats", "Must be positive"));
    }
    if price < BigDecimal::from(0) {
        return Err(ApiError::field_error("price", "Must be non-negative"));
    }
    if let Some(ends_on) = payload.ends_on {
        if ends_on < payload.starts_on {
            return Err(ApiError::field_error("ends_on", "Cannot be before starts_on"));
        }
    }

    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        r#"
        INSERT INTO subscriptions (company_id, plan_name, seats, price, starts_on, ends_on)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        COLUMNS
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user.company_id)
        .bind(&plan_name)
        .bind(payload.seats)
        .bind(&price)
        .bind(payload.starts_on)
        .bind(payload.ends_on)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(subscription))
}

/// PATCH /api/subscriptions/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubscription>,
) -> ApiResult<Subscription> {
    let mut ub = UpdateBuilder::new();
    if let Some(plan_name) = payload.plan_name {
        ub.set("plan_name", json!(require_field("plan_name", &plan_name)?));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if let Some(seats) = payload.seats {
        if seats <= 0 {
            return Err(ApiError::field_error("seats", "Must be positive"));
        }
        ub.set("seats", json!(seats));
    }
    if let Some(price) = payload.price {
        let price = parse_decimal("price", &price)?;
        ub.set_with("\"price\" = $?::numeric", json!(price.to_string()));
    }
    if let Some(ends_on) = payload.ends_on {
        ub.set_with("\"ends_on\" = $?::date", json!(ends_on.to_string()));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE subscriptions SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let subscription: Subscription = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    Ok(ApiResponse::success(subscription))
}

/// DELETE /api/subscriptions/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE subscriptions SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Subscription not found"));
    }
    Ok(ApiResponse::message("Subscription deleted"))
}
