//! Direct-database chores: schema verification and tenant bootstrap. These
//! talk to Postgres through the same pool manager as the server.

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use sqlx::Row;

use crate::auth::{generate_salt, hash_password};
use crate::cli::OutputFormat;
use crate::database::manager::DatabaseManager;

/// Tables the schema in sql/schema.sql is expected to create
const REQUIRED_TABLES: &[&str] = &[
    "companies",
    "users",
    "employees",
    "departments",
    "positions",
    "attendance",
    "documents",
    "contracts",
    "expenses",
    "expense_items",
    "tickets",
    "ticket_comments",
    "subscriptions",
    "orders",
    "events",
    "event_participants",
    "messages",
    "time_logs",
    "system_settings",
    "custom_fields",
    "testing_records",
    "job_cards",
];

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Verify that all required tables exist in the database")]
    CheckSchema,

    #[command(about = "Bootstrap a company with an admin user")]
    CreateCompany {
        #[arg(help = "Company name")]
        name: String,
        #[arg(help = "Admin email")]
        email: String,
        #[arg(help = "Admin password")]
        password: String,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::CheckSchema => check_schema(output_format).await,
        AdminCommands::CreateCompany { name, email, password } => {
            create_company(&name, &email, &password, output_format).await
        }
    }
}

async fn check_schema(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await.context("database unavailable")?;

    let rows = sqlx::query(
        "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_all(&pool)
    .await?;

    let existing: Vec<String> = rows
        .iter()
        .map(|r| r.try_get::<String, _>("table_name"))
        .collect::<Result<_, _>>()?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|t| !existing.iter().any(|e| e == t))
        .collect();

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "required": REQUIRED_TABLES,
                    "missing": missing,
                    "ok": missing.is_empty(),
                }))?
            );
        }
        OutputFormat::Text => {
            if missing.is_empty() {
                println!("Schema OK: all {} tables present", REQUIRED_TABLES.len());
            } else {
                println!("Missing tables: {}", missing.join(", "));
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("schema incomplete, apply sql/schema.sql first");
    }
    Ok(())
}

async fn create_company(
    name: &str,
    email: &str,
    password: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if password.len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }

    let pool = DatabaseManager::pool().await.context("database unavailable")?;
    let mut tx = pool.begin().await?;

    let company_row = sqlx::query("INSERT INTO companies (name, email) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(email.to_lowercase())
        .fetch_one(&mut *tx)
        .await?;
    let company_id: i64 = company_row.try_get("id")?;

    let salt = generate_salt();
    let password_hash = hash_password(password, &salt);
    let user_row = sqlx::query(
        r#"
        INSERT INTO users (company_id, email, password_hash, password_salt, role, first_name, last_name)
        VALUES ($1, $2, $3, $4, 'admin', 'Admin', 'User')
        RETURNING id
        "#,
    )
    .bind(company_id)
    .bind(email.to_lowercase())
    .bind(&password_hash)
    .bind(&salt)
    .fetch_one(&mut *tx)
    .await
    .context("failed to create admin user (email may already be registered)")?;
    let user_id: i64 = user_row.try_get("id")?;

    tx.commit().await?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "company_id": company_id,
                    "user_id": user_id,
                    "email": email.to_lowercase(),
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Created company {} (id {}) with admin {}", name, company_id, email);
        }
    }
    Ok(())
}
