//! Daily attendance rows per employee: a work date with optional check-in and
//! check-out times.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::api::pagination::{page_params, pagination_meta};
use crate::database::manager::DatabaseManager;
use crate::database::sql::{fetch_all_as, fetch_count, fetch_optional_as, UpdateBuilder, WhereBuilder};
use crate::error::ApiError;
use crate::handlers::assert_tenant_row;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub company_id: i64,
    pub employee_id: i64,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, employee_id, work_date, check_in, check_out, status, \
                       notes, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub employee_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAttendance {
    pub employee_id: i64,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAttendance {
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// GET /api/attendance - filter by employee and date range
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Attendance>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }
    if let Some(from) = query.from {
        wb.and("work_date >= $?::date", json!(from.to_string()));
    }
    if let Some(to) = query.to {
        wb.and("work_date <= $?::date", json!(to.to_string()));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM attendance {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM attendance {} ORDER BY work_date DESC, id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<Attendance> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/attendance/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Attendance> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM attendance WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let row = sqlx::query_as::<_, Attendance>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;
    Ok(ApiResponse::success(row))
}

/// POST /api/attendance
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateAttendance>,
) -> ApiResult<Attendance> {
    if let (Some(check_in), Some(check_out)) = (payload.check_in, payload.check_out) {
        if check_out < check_in {
            return Err(ApiError::field_error(
                "check_out",
                "Check-out cannot be before check-in",
            ));
        }
    }

    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "employees", payload.employee_id, user.company_id, "employee_id").await?;

    let sql = format!(
        r#"
        INSERT INTO attendance (company_id, employee_id, work_date, check_in, check_out, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        COLUMNS
    );
    let row = sqlx::query_as::<_, Attendance>(&sql)
        .bind(user.company_id)
        .bind(payload.employee_id)
        .bind(payload.work_date)
        .bind(payload.check_in)
        .bind(payload.check_out)
        .bind(payload.status.as_deref().unwrap_or("present"))
        .bind(&payload.notes)
        .fetch_one(&pool)
        .await?;

    Ok(ApiResponse::created(row))
}

/// PATCH /api/attendance/:id - typically used to record check-out
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAttendance>,
) -> ApiResult<Attendance> {
    let mut ub = UpdateBuilder::new();
    if let Some(check_in) = payload.check_in {
        ub.set_with("\"check_in\" = $?::time", json!(check_in.to_string()));
    }
    if let Some(check_out) = payload.check_out {
        ub.set_with("\"check_out\" = $?::time", json!(check_out.to_string()));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(status));
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
        "UPDATE attendance SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let row: Attendance = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/attendance/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE attendance SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Attendance record not found"));
    }
    Ok(ApiResponse::message("Attendance record deleted"))
}
