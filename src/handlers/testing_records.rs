//! Testing records with their job cards. A record and its cards are created
//! in one transaction; record numbers are count-derived.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
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

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestingRecord {
    pub id: i64,
    pub company_id: i64,
    pub record_number: String,
    pub subject: String,
    pub employee_id: Option<i64>,
    pub status: String,
    pub scheduled_date: Option<NaiveDate>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobCard {
    pub id: i64,
    pub testing_record_id: i64,
    pub task: String,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, company_id, record_number, subject, employee_id, status, \
                       scheduled_date, result, created_at, updated_at";
const CARD_COLUMNS: &str =
    "id, testing_record_id, task, status, assigned_to, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub employee_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct JobCardInput {
    pub task: String,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestingRecord {
    pub subject: String,
    pub employee_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub job_cards: Vec<JobCardInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTestingRecord {
    pub subject: Option<String>,
    pub status: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobCard {
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

async fn cards_for(pool: &sqlx::PgPool, record_id: i64) -> Result<Vec<JobCard>, ApiError> {
    let sql = format!(
        "SELECT {} FROM job_cards WHERE testing_record_id = $1 ORDER BY id ASC",
        CARD_COLUMNS
    );
    Ok(sqlx::query_as::<_, JobCard>(&sql)
        .bind(record_id)
        .fetch_all(pool)
        .await?)
}

/// GET /api/testing-records
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<TestingRecord>> {
    let pool = DatabaseManager::pool().await?;
    let p = page_params(query.page, query.per_page);

    let mut wb = WhereBuilder::new();
    wb.and("company_id = $?", json!(user.company_id));
    wb.and_raw("is_deleted = FALSE");
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        wb.and("status = $?", json!(status));
    }
    if let Some(employee_id) = query.employee_id {
        wb.and("employee_id = $?", json!(employee_id));
    }

    let count_sql = format!("SELECT COUNT(*) AS count FROM testing_records {}", wb.clause());
    let total = fetch_count(&pool, &count_sql, wb.params()).await?;

    let sql = format!(
        "SELECT {} FROM testing_records {} ORDER BY id DESC LIMIT {} OFFSET {}",
        COLUMNS,
        wb.clause(),
        p.limit(),
        p.offset()
    );
    let rows: Vec<TestingRecord> = fetch_all_as(&pool, &sql, wb.params()).await?;

    Ok(ApiResponse::paginated(rows, pagination_meta(&p, total)))
}

/// GET /api/testing-records/:id - record plus its job cards
pub async fn get(Extension(user): Extension<AuthUser>, Path(id): Path<i64>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let sql = format!(
        "SELECT {} FROM testing_records WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        COLUMNS
    );
    let record = sqlx::query_as::<_, TestingRecord>(&sql)
        .bind(id)
        .bind(user.company_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Testing record not found"))?;

    let cards = cards_for(&pool, record.id).await?;
    Ok(ApiResponse::success(json!({
        "record": record,
        "job_cards": cards,
    })))
}

/// POST /api/testing-records - record plus job cards in one transaction
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTestingRecord>,
) -> ApiResult<Value> {
    let subject = require_field("subject", &payload.subject)?;

    let pool = DatabaseManager::pool().await?;
    if let Some(employee_id) = payload.employee_id {
        assert_tenant_row(&pool, "employees", employee_id, user.company_id, "employee_id").await?;
    }
    for card in &payload.job_cards {
        require_field("job_cards.task", &card.task)?;
        if let Some(assigned_to) = card.assigned_to {
            assert_tenant_row(&pool, "employees", assigned_to, user.company_id, "job_cards.assigned_to")
                .await?;
        }
    }

    let mut tx = pool.begin().await?;
    let sequence = next_sequence(&mut tx, "testing_records", user.company_id).await?;
    let record_number = format_reference("TR", sequence);

    let sql = format!(
        r#"
        INSERT INTO testing_records (company_id, record_number, subject, employee_id, scheduled_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        COLUMNS
    );
    let record = sqlx::query_as::<_, TestingRecord>(&sql)
        .bind(user.company_id)
        .bind(&record_number)
        .bind(&subject)
        .bind(payload.employee_id)
        .bind(payload.scheduled_date)
        .fetch_one(&mut *tx)
        .await?;

    let card_sql = format!(
        "INSERT INTO job_cards (testing_record_id, task, assigned_to) VALUES ($1, $2, $3) RETURNING {}",
        CARD_COLUMNS
    );
    let mut cards = Vec::with_capacity(payload.job_cards.len());
    for card in &payload.job_cards {
        let row = sqlx::query_as::<_, JobCard>(&card_sql)
            .bind(record.id)
            .bind(card.task.trim())
            .bind(card.assigned_to)
            .fetch_one(&mut *tx)
            .await?;
        cards.push(row);
    }

    tx.commit().await?;

    Ok(ApiResponse::created(json!({
        "record": record,
        "job_cards": cards,
    })))
}

/// PATCH /api/testing-records/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTestingRecord>,
) -> ApiResult<TestingRecord> {
    let mut ub = UpdateBuilder::new();
    if let Some(subject) = payload.subject {
        ub.set("subject", json!(require_field("subject", &subject)?));
    }
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if let Some(scheduled_date) = payload.scheduled_date {
        ub.set_with("\"scheduled_date\" = $?::date", json!(scheduled_date.to_string()));
    }
    if let Some(result) = payload.result {
        ub.set("result", json!(result));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = DatabaseManager::pool().await?;
    let id_ph = ub.param(json!(id));
    let company_ph = ub.param(json!(user.company_id));
    let sql = format!(
        "UPDATE testing_records SET {} WHERE id = {} AND company_id = {} AND is_deleted = FALSE RETURNING {}",
        ub.set_clause(),
        id_ph,
        company_ph,
        COLUMNS
    );
    let record: TestingRecord = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Testing record not found"))?;
    Ok(ApiResponse::success(record))
}

/// PATCH /api/testing-records/:id/job-cards/:card_id
pub async fn update_job_card(
    Extension(user): Extension<AuthUser>,
    Path((id, card_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateJobCard>,
) -> ApiResult<JobCard> {
    let pool = DatabaseManager::pool().await?;
    assert_tenant_row(&pool, "testing_records", id, user.company_id, "testing_record_id").await?;

    let mut ub = UpdateBuilder::new();
    if let Some(status) = payload.status {
        ub.set("status", json!(require_field("status", &status)?));
    }
    if let Some(assigned_to) = payload.assigned_to {
        assert_tenant_row(&pool, "employees", assigned_to, user.company_id, "assigned_to").await?;
        ub.set("assigned_to", json!(assigned_to));
    }
    if ub.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let card_ph = ub.param(json!(card_id));
    let record_ph = ub.param(json!(id));
    let sql = format!(
        "UPDATE job_cards SET {} WHERE id = {} AND testing_record_id = {} RETURNING {}",
        ub.set_clause(),
        card_ph,
        record_ph,
        CARD_COLUMNS
    );
    let card: JobCard = fetch_optional_as(&pool, &sql, ub.params())
        .await?
        .ok_or_else(|| ApiError::not_found("Job card not found"))?;
    Ok(ApiResponse::success(card))
}

/// DELETE /api/testing-records/:id - soft delete
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let result = sqlx::query(
        "UPDATE testing_records SET is_deleted = TRUE WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user.company_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Testing record not found"));
    }
    Ok(ApiResponse::message("Testing record deleted"))
}
