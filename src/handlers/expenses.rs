//! Expense reports with line items. The expense total is computed from its
//! items at create time and stored on the parent row; parent and children are
//! inserted in one transaction.

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
use crate::handlers::{assert_tenant_row, parse_decimal, require_field};
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Expense {
    pub id: i64,
    pub company_id: i64,
    pub employee_id: Option<i64>,
    pub title: String,
    pub expense_date: NaiveDate,
    pub status: String,
    pub total: BigDecimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpenseItem {
    pub id: i64,
    pub expense_id: i64,
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub amount: BigDecimal,
}

const COLUMNS: &str = "id, company_id, employee_id, title, expense_date, status, total, notes, \
                       created_at, updated_at";
const ITEM_COLUMNS: &str = "id, expense_id, description, quantity, unit_price, amount";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub employee_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseItemInput {
    pub description: String,
    pub quantity: Option<String>,
    pub unit_price: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpense {
    pub title: String,
    pub expense_date: NaiveDate,
    pub employee_id: Option<i64>,
    pub notes: Option<String>,
    pub items: Vec<ExpenseItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpense {
    pub title: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Parsed line item ready for insertion
struct LineItem {
    description: String,
    quantity: BigDecimal,
    unit_price: BigDecimal,
    amount: BigDecimal,
}

fn parse_items(inputs: &[ExpenseItemInput]) -> Result<Vec<LineItem>, ApiError> {
    if inputs.is_empty() {
        return Err(ApiError::field_error("items", "At least one line item is required"));
    }
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let description = require_field("items.description", &input.description)?;
        let quantity = match &input.quantity {
            Some(q) => parse_decimal("items.quantity", q)?,
            None => BigDecimal::from(1),
        };
        let unit_price = parse_decimal("items.unit_price", &input.unit_price)?;
        if quantity <= BigDecimal::from(0) {
            return Err(ApiError::field_error("items.quantity", "Must be positive"));
        }
        if unit_price < BigDecimal::from(0) {
            return Err(ApiError::field_error("items.unit_price", "Must be non-negative"));
        }
        let amount = &quantity * &unit_price;
        items.push(LineItem { description, quantity, unit_price, amount });
    }
    Ok(items)
}

fn compute_total(items: &[LineItem]) -> BigDecimal {
    items
        .iter()
        .fold(BigDecimal::from(0), |acc, item| acc + &item.amount)
}

/// GET /api/expenses
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Expense>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(from) = query.from {
        wb.and("expense_date >= $?::date", json!(from.to_string()));
    }
    if let Some(to) = query.to {
        wb.and("expense_date <= $?::date", json!(to.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM expenses {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM expenses {} ORDER BY expense_date DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Expense> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/expenses/:id - expense with its line items
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM expenses WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let expense = sqlx::query_as::<_, Expense>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Expense not found"))?;

    let items_sql = format!(
        "SELECT {} FROM expense_items WHERE expense_id = $1 ORDER BY id ASC",
        ITEM_COLUMNS
    );
    let items = sqlx::query_as::<_, ExpenseItem>(&items_sql)
        .bind(expense.id)
        .fetch_all(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "expense": expense, "items": items })))
}

/// POST /api/expenses - insert expense plus line items in one transaction
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateExpense>,
) -> ApiResult<Value> {
    let title = require_field("title", &payload.title)?;
    let items = parse_items(&payload.items)?;
    let total = compute_total(&items);

    let pool = DatabaseManager::pool().await?;
    if let Some(employee_id) = payload.employee_id {
        assert_tenant_row(&pool, "employees", employee_id, user.company_id, "employee_id").await?;
    }

    let mut tx = pool.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO expenses (company_id, employee_id, title, expense_date, total, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        COLUMNS
    );
    let expense = sqlx::query_as::<_, Expense>(&sql)
        .bind(user.company_id)
        .bind(payload.employee_id)
        .bind(&title)
        .bind(payload.expense_date)
        .bind(&total)
        .bind(&payload.notes)
        .fetch_one(&mut *tx)
        .await?;

    let item_sql = format!(
        r#"
        INSERT INTO expense_items (expense_id, description, quantity, unit_price, amount)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let mut inserted_items = Vec::with_capacity(items.len());
    for item in &items {
        let row = sqlx::query_as::<_, ExpenseItem>(&item_sql)
            .bind(expense.id)
            .bind(&item.description)
            .bind(&item.quantity)
            .bind(&item.unit_price)
            .bind(&item.amount)
            .fetch_one(&mut *tx)
            .await?;
        inserted_items.push(row);
    }

    tx.commit().await?;

    Ok(ApiResponse::created(json!({ "expense": expense, "items": inserted_items })))
}

/// PATCH /api/expenses/:id - header fields only; items are immutable
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExpense>,
) -> ApiResult<Expense> {
    let mut ub = UpdateBuilder::new();
    if let Some(title) = payload.title {
        ub.set("title", json!(require_field("title", &title)?));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
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
        "UPDATE expenses SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let expense: Expense = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Expense not found"))?;
    Ok(ApiResponse::success(expense))
}

/// DELETE /api/expenses/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE expenses SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Expense not found"));
    }
    Ok(ApiResponse::message("Expense deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, quantity: Option<&str>, unit_price: &str) -> ExpenseItemInput {
        ExpenseItemInput {
            description: description.to_string(),
            quantity: quantity.map(str::to_string),
            unit_price: unit_price.to_string(),
        }
    }

    #[test]
    fn total_is_sum_of_quantity_times_price() {
        let items = parse_items(&[
            item("Hotel", Some("2"), "120.00"),
            item("Taxi", None, "14.50"),
        ])
        .unwrap();
        assert_eq!(compute_total(&items).to_string(), "254.50");
    }

    #[test]
    fn line_amount_uses_default_quantity_of_one() {
        let items = parse_items(&[item("Lunch", None, "9.90")]).unwrap();
        assert_eq!(items[0].amount.to_string(), "9.90");
    }

    #[test]
    fn rejects_empty_items_and_bad_numbers() {
        assert!(parse_items(&[]).is_err());
        assert!(parse_items(&[item("x", Some("0"), "5")]).is_err());
        assert!(parse_items(&[item("x", Some("-1"), "5")]).is_err());
        assert!(parse_items(&[item("x", None, "-5")]).is_err());
        assert!(parse_items(&[item("x", None, "abc")]).is_err());
        assert!(parse_items(&[item("  ", None, "5")]).is_err());
    }
}
