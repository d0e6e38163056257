// BIN Scope - Web Server
// REST API over the BIN resolver with Axum

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use binscope::{logging, lookup, BinRecord, BinTable, LookupOutcome, Settings};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    table: Arc<BinTable>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/bins - All registered records
async fn list_bins(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.table.all_records()))
}

/// GET /api/bins/:query - Normalize and resolve one BIN
async fn get_bin(State(state): State<AppState>, Path(query): Path<String>) -> impl IntoResponse {
    match lookup(&state.table, &query) {
        LookupOutcome::Found { record } => (StatusCode::OK, Json(ApiResponse::ok(record))),
        LookupOutcome::NotFound { query } => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<BinRecord>::err(format!("BIN {} not found in database", query))),
        ),
        LookupOutcome::Rejected { reason } => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<BinRecord>::err(reason)),
        ),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/bins", get(list_bins))
        .route("/bins/:query", get(get_bin))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        error!("server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let table = settings.load_bin_table()?;
    info!(records = table.len(), "BIN table ready");

    let state = AppState {
        table: Arc::new(table),
    };

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    info!(addr = %settings.server_addr, "server listening");
    println!("\n🚀 Server running on http://{}", settings.server_addr);
    println!("   API: http://{}/api/bins/400000", settings.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
