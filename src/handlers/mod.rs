//! Request handlers, one module per resource. Every module follows the same
//! three templates: filtered+paginated list, validated create (transactional
//! when a child row depends on the parent id), and tenant-scoped
//! update/soft-delete.

pub mod attendance;
pub mod auth;
pub mod company;
pub mod contracts;
pub mod departments;
pub mod documents;
pub mod employees;
pub mod events;
pub mod expenses;
pub mod messages;
pub mod orders;
pub mod positions;
pub mod settings;
pub mod subscriptions;
pub mod testing_records;
pub mod tickets;
pub mod time_logs;
pub mod users;

use chrono::{Datelike, Utc};
use sqlx::{PgConnection, PgPool, Row};

use crate::error::ApiError;

/// Next count-derived sequence number for a tenant-scoped table.
///
/// Runs inside the caller's transaction so the read and the dependent insert
/// commit together.
pub async fn next_sequence(
    conn: &mut PgConnection,
    table: &str,
    company_id: i64,
) -> Result<i64, ApiError> {
    let sql = format!(
        "SELECT COUNT(*) AS count FROM \"{}\" WHERE company_id = $1",
        table
    );
    let row = sqlx::query(&sql).bind(company_id).fetch_one(conn).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count + 1)
}

/// Human-facing reference number, e.g. `TKT-2026-0042`
pub fn format_reference(prefix: &str, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, Utc::now().year(), sequence)
}

/// Reject a missing or blank required string field with a 400
pub fn require_field(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::field_error(field, "This field is required"));
    }
    Ok(trimmed.to_string())
}

/// Parse a decimal request field (money, hours) or reject with a 400
pub fn parse_decimal(field: &str, value: &str) -> Result<bigdecimal::BigDecimal, ApiError> {
    value
        .trim()
        .parse::<bigdecimal::BigDecimal>()
        .map_err(|_| ApiError::field_error(field, format!("Invalid decimal value: {}", value)))
}

/// Verify that a referenced row exists and belongs to the caller's tenant
pub async fn assert_tenant_row(
    pool: &PgPool,
    table: &str,
    id: i64,
    company_id: i64,
    field: &str,
) -> Result<(), ApiError> {
    let sql = format!(
        "SELECT 1 AS one FROM \"{}\" WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        table
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
    if row.is_none() {
        return Err(ApiError::field_error(field, "Unknown identifier"));
    }
    Ok(())
}

/// Map a unique-constraint violation to a 409, pass everything else through
pub fn map_unique_violation(err: sqlx::Error, message: &str) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return ApiError::conflict(message);
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_format_pads_sequence() {
        let reference = format_reference("TKT", 42);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TKT");
        assert_eq!(parts[2], "0042");
    }

    #[test]
    fn reference_format_keeps_large_sequences() {
        let reference = format_reference("ORD", 123456);
        assert!(reference.ends_with("-123456"));
    }

    #[test]
    fn require_field_trims_and_rejects_blank() {
        assert_eq!(require_field("name", "  Ada  ").unwrap(), "Ada");
        assert!(require_field("name", "   ").is_err());
        assert!(require_field("name", "").is_err());
    }

    #[test]
    fn parse_decimal_accepts_money_strings() {
        assert_eq!(parse_decimal("price", "1200.50").unwrap().to_string(), "1200.50");
        assert!(parse_decimal("price", "not-a-number").is_err());
    }
}
