// Demand Triage - Web Server
// REST API over the persisted collection

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use demand_triage::{
    logging, serialize, FieldUpdate, Item, ItemFilter, ItemId, ItemStore, SnapshotStore,
    TriageConfig, TriageError,
};

/// Collection plus the snapshot store it is persisted to
struct Triage {
    store: ItemStore,
    snapshots: SnapshotStore,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    triage: Arc<Mutex<Triage>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, Triage> {
        // A panicked handler leaves the collection as it was after its last full mutation
        self.triage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
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

#[derive(Serialize)]
struct StatsResponse {
    total_items: usize,
    on_board: usize,
    in_backlog: usize,
    squads: Vec<String>,
}

fn triage_error(e: &TriageError) -> Response {
    let status = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!(error = %e, "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::err(format!("{}: {}", context, e))),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/items - Items in planning order, optionally filtered
async fn get_items(
    State(state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> impl IntoResponse {
    let triage = state.lock();
    let items: Vec<Item> = triage
        .store
        .sorted_backlog()
        .into_iter()
        .filter(|item| filter.matches(item))
        .cloned()
        .collect();

    Json(ApiResponse::ok(items))
}

/// GET /api/items/:id
async fn get_item(State(state): State<AppState>, Path(id): Path<ItemId>) -> Response {
    let triage = state.lock();
    match triage.store.get(id) {
        Some(item) => (StatusCode::OK, Json(ApiResponse::ok(item.clone()))).into_response(),
        None => triage_error(&TriageError::UnknownItem(id)),
    }
}

/// PATCH /api/items/:id - Apply one field update, e.g. `{"field": "effort", "value": "Alto"}`
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    Json(update): Json<FieldUpdate>,
) -> Response {
    let mut triage = state.lock();

    if let Err(e) = triage.store.apply(id, update.clone()) {
        warn!(id, field = update.field_name(), error = %e, "rejected update");
        return triage_error(&e);
    }

    let Triage { store, snapshots } = &*triage;
    if let Err(e) = snapshots.record_update(store.items(), id, &update, "api") {
        return internal_error("Failed to persist update", e);
    }

    info!(id, field = update.field_name(), "item updated");
    match store.get(id) {
        Some(item) => (StatusCode::OK, Json(ApiResponse::ok(item.clone()))).into_response(),
        None => triage_error(&TriageError::UnknownItem(id)),
    }
}

/// GET /api/stats - Board/backlog counts
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let triage = state.lock();
    let stats = StatsResponse {
        total_items: triage.store.len(),
        on_board: triage.store.board().len(),
        in_backlog: triage.store.backlog().len(),
        squads: triage.store.squads(),
    };
    Json(ApiResponse::ok(stats))
}

/// GET /api/export - Enriched spreadsheet as CSV
async fn export_csv(State(state): State<AppState>) -> Response {
    let triage = state.lock();
    match serialize(triage.store.items()) {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"base_classificada.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => internal_error("Failed to serialize export", e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = TriageConfig::load(config_path.as_deref())?;

    let snapshots = SnapshotStore::open(&config.database_path, config.snapshot_key.clone())?;
    let store = ItemStore::from_items(snapshots.load());
    info!(
        items = store.len(),
        db = %config.database_path.display(),
        "collection loaded"
    );

    let state = AppState {
        triage: Arc::new(Mutex::new(Triage { store, snapshots })),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/items", get(get_items))
        .route("/items/:id", get(get_item).patch(update_item))
        .route("/stats", get(get_stats))
        .route("/export", get(export_csv))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://localhost:3000 (API under /api)");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
