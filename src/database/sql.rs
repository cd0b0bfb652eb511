//! Small SQL assembly helpers shared by every handler.
//!
//! List endpoints fold optional query filters into a `WhereBuilder`; update
//! endpoints fold supplied body fields into an `UpdateBuilder`. Both hand out
//! `$n` placeholders and keep the matching parameter values in order, so the
//! final statement is always fully parameterized.

use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool, Row};

use crate::database::manager::DatabaseError;

/// Incremental WHERE clause builder.
///
/// Conditions are written as templates with `$?` marking the spot for the
/// bound value; every `$?` in one template refers to the same value, so
/// `(first_name ILIKE $? OR last_name ILIKE $?)` binds a single parameter.
#[derive(Debug, Default)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition with no bound value, e.g. `is_deleted = FALSE`
    pub fn and_raw(&mut self, condition: &str) -> &mut Self {
        self.conditions.push(condition.to_string());
        self
    }

    /// Condition template with `$?` placeholder(s) for one bound value
    pub fn and(&mut self, template: &str, value: Value) -> &mut Self {
        let placeholder = self.push_param(value);
        self.conditions.push(template.replace("$?", &placeholder));
        self
    }

    /// `WHERE ...` clause, or an empty string when no conditions were added
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn push_param(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

/// Dynamic SET clause builder for partial updates.
///
/// Placeholder numbering continues past the SET fields so WHERE-side binds
/// (id, company_id) can be appended with `param()`.
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    sets: Vec<String>,
    params: Vec<Value>,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain `"column" = $n` assignment
    pub fn set(&mut self, column: &str, value: Value) -> &mut Self {
        let placeholder = self.push_param(value);
        self.sets.push(format!("\"{}\" = {}", column, placeholder));
        self
    }

    /// Assignment template with `$?`, for casts like `"salary" = $?::numeric`
    pub fn set_with(&mut self, template: &str, value: Value) -> &mut Self {
        let placeholder = self.push_param(value);
        self.sets.push(template.replace("$?", &placeholder));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn set_clause(&self) -> String {
        self.sets.join(", ")
    }

    /// Reserve a placeholder for a WHERE-side bind and return it ("$n")
    pub fn param(&mut self, value: Value) -> String {
        self.push_param(value)
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn push_param(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

/// Bind a JSON value onto a plain query
pub fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

/// Bind a JSON value onto a typed query
pub fn bind_value_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

/// Run a SELECT with dynamically collected params, mapping rows to `T`
pub async fn fetch_all_as<T>(
    pool: &PgPool,
    sql: &str,
    params: &[Value],
) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(sql);
    for p in params {
        q = bind_value_as(q, p);
    }
    Ok(q.fetch_all(pool).await?)
}

/// Run a single-row SELECT with dynamically collected params
pub async fn fetch_optional_as<T>(
    pool: &PgPool,
    sql: &str,
    params: &[Value],
) -> Result<Option<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(sql);
    for p in params {
        q = bind_value_as(q, p);
    }
    Ok(q.fetch_optional(pool).await?)
}

/// Run a `SELECT COUNT(*) AS count ...` statement
pub async fn fetch_count(
    pool: &PgPool,
    sql: &str,
    params: &[Value],
) -> Result<i64, DatabaseError> {
    let mut q = sqlx::query(sql);
    for p in params {
        q = bind_value(q, p);
    }
    let row = q.fetch_one(pool).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_builder_numbers_params_in_order() {
        let mut wb = WhereBuilder::new();
        wb.and("company_id = $?", json!(7));
        wb.and_raw("is_deleted = FALSE");
        wb.and("status = $?", json!("active"));
        assert_eq!(
            wb.clause(),
            "WHERE company_id = $1 AND is_deleted = FALSE AND status = $2"
        );
        assert_eq!(wb.params().len(), 2);
    }

    #[test]
    fn where_builder_repeats_placeholder_for_one_value() {
        let mut wb = WhereBuilder::new();
        wb.and("(first_name ILIKE $? OR last_name ILIKE $?)", json!("%ann%"));
        assert_eq!(wb.clause(), "WHERE (first_name ILIKE $1 OR last_name ILIKE $1)");
        assert_eq!(wb.params(), &[json!("%ann%")]);
    }

    #[test]
    fn empty_where_builder_renders_nothing() {
        let wb = WhereBuilder::new();
        assert_eq!(wb.clause(), "");
        assert!(wb.params().is_empty());
    }

    #[test]
    fn update_builder_continues_numbering_into_where_binds() {
        let mut ub = UpdateBuilder::new();
        ub.set("first_name", json!("Ann"));
        ub.set_with("\"salary\" = $?::numeric", json!("1200.50"));
        let id_ph = ub.param(json!(42));
        let company_ph = ub.param(json!(7));
        assert_eq!(ub.set_clause(), "\"first_name\" = $1, \"salary\" = $2::numeric");
        assert_eq!(id_ph, "$3");
        assert_eq!(company_ph, "$4");
        assert_eq!(ub.params().len(), 4);
        assert!(!ub.is_empty());
    }

    #[test]
    fn update_builder_reports_empty() {
        let ub = UpdateBuilder::new();
        assert!(ub.is_empty());
    }
}
