use axum::{middleware, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use opsdesk_api::handlers;
use opsdesk_api::middleware::auth::jwt_auth_middleware;
use opsdesk_api::middleware::roles::{self, ADMIN_ONLY, STAFF};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = opsdesk_api::config::config();
    tracing::info!("Starting OpsDesk API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("OPSDESK_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("OpsDesk API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    let protected = Router::new()
        .route("/api/auth/whoami", get(handlers::auth::whoami))
        .merge(company_routes())
        .merge(user_routes())
        .merge(employee_routes())
        .merge(department_routes())
        .merge(position_routes())
        .merge(attendance_routes())
        .merge(document_routes())
        .merge(contract_routes())
        .merge(expense_routes())
        .merge(ticket_routes())
        .merge(subscription_routes())
        .merge(order_routes())
        .merge(event_routes())
        .merge(message_routes())
        .merge(time_log_routes())
        .merge(settings_routes())
        .merge(testing_record_routes())
        .layer(middleware::from_fn(jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use axum::routing::post;
    use handlers::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
}

fn company_routes() -> Router {
    use axum::routing::patch;
    use handlers::company;

    let writes = Router::new()
        .route("/api/company", patch(company::update))
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, roles::require_role));

    Router::new()
        .route("/api/company", get(company::get))
        .merge(writes)
}

fn user_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::users;

    let writes = Router::new()
        .route("/api/users", post(users::create))
        .route("/api/users/:id", patch(users::update).delete(users::delete))
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, roles::require_role));

    Router::new()
        .route("/api/users", get(users::list))
        .route("/api/users/:id", get(users::get))
        .merge(writes)
}

fn employee_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::employees;

    let writes = Router::new()
        .route("/api/employees", post(employees::create))
        .route("/api/employees/:id", patch(employees::update).delete(employees::delete))
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/employees", get(employees::list))
        .route("/api/employees/:id", get(employees::get))
        .merge(writes)
}

fn department_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::departments;

    let writes = Router::new()
        .route("/api/departments", post(departments::create))
        .route("/api/departments/:id", patch(departments::update).delete(departments::delete))
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/departments", get(departments::list))
        .route("/api/departments/:id", get(departments::get))
        .merge(writes)
}

fn position_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::positions;

    let writes = Router::new()
        .route("/api/positions", post(positions::create))
        .route("/api/positions/:id", patch(positions::update).delete(positions::delete))
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/positions", get(positions::list))
        .route("/api/positions/:id", get(positions::get))
        .merge(writes)
}

fn attendance_routes() -> Router {
    use handlers::attendance;

    Router::new()
        .route("/api/attendance", get(attendance::list).post(attendance::create))
        .route(
            "/api/attendance/:id",
            get(attendance::get)
                .patch(attendance::update)
                .delete(attendance::delete),
        )
}

fn document_routes() -> Router {
    use handlers::documents;

    Router::new()
        .route("/api/documents", get(documents::list).post(documents::create))
        .route(
            "/api/documents/:id",
            get(documents::get)
                .patch(documents::update)
                .delete(documents::delete),
        )
}

fn contract_routes() -> Router {
    use handlers::contracts;

    // Salary data: the whole resource is staff-only
    Router::new()
        .route("/api/contracts", get(contracts::list).post(contracts::create))
        .route(
            "/api/contracts/:id",
            get(contracts::get)
                .patch(contracts::update)
                .delete(contracts::delete),
        )
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role))
}

fn expense_routes() -> Router {
    use axum::routing::patch;
    use handlers::expenses;

    let reviews = Router::new()
        .route("/api/expenses/:id", patch(expenses::update).delete(expenses::delete))
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/expenses", get(expenses::list).post(expenses::create))
        .route("/api/expenses/:id", get(expenses::get))
        .merge(reviews)
}

fn ticket_routes() -> Router {
    use handlers::tickets;

    Router::new()
        .route("/api/tickets", get(tickets::list).post(tickets::create))
        .route(
            "/api/tickets/:id",
            get(tickets::get)
                .patch(tickets::update)
                .delete(tickets::delete),
        )
        .route(
            "/api/tickets/:id/comments",
            get(tickets::list_comments).post(tickets::create_comment),
        )
}

fn subscription_routes() -> Router {
    use handlers::subscriptions;

    Router::new()
        .route(
            "/api/subscriptions",
            get(subscriptions::list).post(subscriptions::create),
        )
        .route(
            "/api/subscriptions/:id",
            get(subscriptions::get)
                .patch(subscriptions::update)
                .delete(subscriptions::delete),
        )
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, roles::require_role))
}

fn order_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::orders;

    let writes = Router::new()
        .route("/api/orders", post(orders::create))
        .route("/api/orders/:id", patch(orders::update).delete(orders::delete))
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/orders", get(orders::list))
        .route("/api/orders/:id", get(orders::get))
        .merge(writes)
}

fn event_routes() -> Router {
    use handlers::events;

    Router::new()
        .route("/api/events", get(events::list).post(events::create))
        .route(
            "/api/events/:id",
            get(events::get).patch(events::update).delete(events::delete),
        )
}

fn message_routes() -> Router {
    use axum::routing::post;
    use handlers::messages;

    Router::new()
        .route("/api/messages", get(messages::list).post(messages::create))
        .route("/api/messages/:id", get(messages::get).delete(messages::delete))
        .route("/api/messages/:id/read", post(messages::mark_read))
}

fn time_log_routes() -> Router {
    use handlers::time_logs;

    Router::new()
        .route("/api/time-logs", get(time_logs::list).post(time_logs::create))
        .route(
            "/api/time-logs/:id",
            get(time_logs::get)
                .patch(time_logs::update)
                .delete(time_logs::delete),
        )
}

fn settings_routes() -> Router {
    use axum::routing::{delete, patch, post, put};
    use handlers::settings;

    let writes = Router::new()
        .route("/api/settings", put(settings::put_setting))
        .route("/api/settings/:key", delete(settings::delete_setting))
        .route("/api/custom-fields", post(settings::create_field))
        .route(
            "/api/custom-fields/:id",
            patch(settings::update_field).delete(settings::delete_field),
        )
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, roles::require_role));

    Router::new()
        .route("/api/settings", get(settings::list_settings))
        .route("/api/custom-fields", get(settings::list_fields))
        .merge(writes)
}

fn testing_record_routes() -> Router {
    use axum::routing::{patch, post};
    use handlers::testing_records;

    let writes = Router::new()
        .route("/api/testing-records", post(testing_records::create))
        .route(
            "/api/testing-records/:id",
            patch(testing_records::update).delete(testing_records::delete),
        )
        .route(
            "/api/testing-records/:id/job-cards/:card_id",
            patch(testing_records::update_job_card),
        )
        .route_layer(middleware::from_fn_with_state(STAFF, roles::require_role));

    Router::new()
        .route("/api/testing-records", get(testing_records::list))
        .route("/api/testing-records/:id", get(testing_records::get))
        .merge(writes)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "OpsDesk API",
            "version": version,
            "description": "Multi-tenant business operations backend (HR, CRM, billing, ticketing, scheduling)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/login, /auth/register (public - token acquisition)",
                "auth": "/api/auth/whoami (protected)",
                "hr": "/api/employees, /api/departments, /api/positions, /api/attendance, /api/contracts, /api/documents, /api/time-logs (protected)",
                "crm": "/api/orders, /api/tickets, /api/messages (protected)",
                "billing": "/api/expenses, /api/subscriptions (protected, role-gated)",
                "scheduling": "/api/events (protected)",
                "admin": "/api/users, /api/company, /api/settings, /api/custom-fields (protected, role-gated)",
                "testing": "/api/testing-records (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match opsdesk_api::database::manager::DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
