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
pub struct TimeLog {
    pub id: i64,
    pub company_id: i64,
    pub employee_id: i64,
    pub log_date: NaiveDate,
    pub hours: BigDecimal,
    pub project: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, company_id, employee_id, log_date, hours, project, notes, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub employee_id: Option<i64>,
    pub project: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTimeLog {
    pub employee_id: i64,
    pub log_date: NaiveDate,
    pub hours: String,
    pub project: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTimeLog {
    pub hours: Option<String>,
    pub project: Option<String>,
    pub notes: Option<String>,
}

fn validate_hours(field: &str, value: &str) -> Result<BigDecimal, ApiError> {
    let hours = parse_decimal(field, value)?;
    if hours <= BigDecimal::from(0) || hours > BigDecimal::from(24) {
        return Err(ApiError::field_error(field, "Must be between 0 and 24"));
    }
    Ok(hours)
}

/// GET /api/time-logs
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<TimeLog>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }
    if let Some(project) = query.project.as_deref().filter(|s| !s.trim().is_empty()) {
        wb.and("project ILIKE $?", json!(format!("%{}%", project.trim())));
    }
    if let Some(from) = query.from {
        wb.and("log_date >= $?::date", json!(from.to_string()));
    }
    if let Some(to) = query.to {
        wb.and("log_date <= $?::date", json!(to.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM time_logs {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM time_logs {} ORDER BY log_date DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<TimeLog> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/time-logs/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<TimeLog> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM time_logs WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let log = sqlx::query_as::<_, TimeLog>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Time log not found"))?;
    Ok(ApiResponse::success(log))
}

/// POST /api/time-logs
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTimeLog>,
) -> ApiResult<TimeLog> {
    let hours = validate_hours("hours", &payload.hours)?;

    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "employees", payload.employee_id, user.company_id, "employee_id").await?;

    let sql = format!(
        r#"
        INSERT INTO time_logs (company_id, employee_id, log_date, hours, project, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        COLUMNS
    );
    let log = sqlx::query_as::<_, TimeLog>(&sql)
        .bind(user.company_id)
        .bind(payload.employee_id)
        .bind(payload.log_date)
        .bind(&hours)
        .bind(&payload.project)
        .bind(&payload.notes)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(log))
}

/// PATCH /api/time-logs/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTimeLog>,
) -> ApiResult<TimeLog> {
    let mut ub = UpdateBuilder::new();
    if let Some(hours) = payload.hours {
        let hours = validate_hours("hours", &hours)?;
        ub.set_with("\"hours\" = $?::numeric", json!(hours.to_string()));
    }
    if let Some(project) = payload.project {
        ub.set("project", json!(project));
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
        "UPDATE time_logs SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let log: TimeLog = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Time log not found"))?;
    Ok(ApiResponse::success(log))
}

/// DELETE /api/time-logs/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE time_logs SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Time log not found"));
    }
    Ok(ApiResponse::message("Time log deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_must_be_in_working_range() {
        assert!(validate_hours("hours", "7.5").is_ok());
        assert!(validate_hours("hours", "24").is_ok());
        assert!(validate_hours("hours", "0").is_err());
        assert!(validate_hours("hours", "-1").is_err());
        assert!(validate_hours("hours", "25").is_err());
        assert!(validate_hours("hours", "seven").is_err());
    }
}
