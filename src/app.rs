use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::database::{AuditLog, DatabaseError, DatabaseManager, TableFactory};
use crate::handlers;
use crate::middleware::jwt_auth_middleware;

struct HealthState {
    storage: &'static str,
    database: Option<DatabaseManager>,
}

/// Full router: public index and health, JWT-protected admin tables.
pub fn app<F: TableFactory>(tables: &F, audit: &AuditLog, database: Option<DatabaseManager>) -> Router {
    let prefix = config::config().api.admin_prefix.clone();
    let admin = handlers::admin_routes(tables, audit).route_layer(middleware::from_fn(jwt_auth_middleware));

    let health = Router::new().route("/health", get(health)).with_state(Arc::new(HealthState {
        storage: tables.name(),
        database,
    }));

    let router = Router::new().route("/", get(root)).merge(health);
    let router = if prefix.is_empty() || prefix == "/" {
        router.merge(admin)
    } else {
        router.nest(&prefix, admin)
    };

    let router = router.layer(cors_layer());
    if config::config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer() -> CorsLayer {
    let security = &config::config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let prefix = &config::config().api.admin_prefix;

    Json(json!({
        "success": true,
        "data": {
            "name": "Volunteer Admin API",
            "version": version,
            "description": "Tabular back-office endpoints for the volunteer management admin panel",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "content_pages": format!("{}{}[/:id] (content.manage)", prefix, handlers::content_pages::PATH),
                "shift_categories": format!("{}{}[/:id]?event_id= (shifts.manage)", prefix, handlers::shift_categories::PATH),
                "program_locations": format!("{}{}[/:id]?event_id= (program.manage)", prefix, handlers::program_locations::PATH),
                "outbox_messages": format!("{}{}[/:id] (outbox.view, read-only)", prefix, handlers::outbox_messages::PATH),
            },
            "conventions": {
                "list": "GET with pagination.page, pagination.pageSize, sort.field, sort.sort",
                "create": "POST row object",
                "update": "PUT /:id with changed fields",
                "delete": "DELETE /:id",
                "reorder": "PUT with {\"order\": [ids]}",
            }
        }
    }))
}

async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let ping = match &state.database {
        Some(database) => Some(database.health_check().await),
        None => None,
    };
    health_report(state.storage, ping)
}

/// Ping failures are logged, never echoed: `/health` is public.
fn health_report(storage: &'static str, ping: Option<Result<(), DatabaseError>>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match ping {
        None => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "storage": storage }
            })),
        ),
        Some(Ok(())) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "storage": storage, "database": "ok" }
            })),
        ),
        Some(Err(e)) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now, "storage": storage }
                })),
            )
        }
    }
}
