//! Production Desk Backend
//!
//! REST backend for live-event video production: crew scheduling with conflict checks, a delivery
//! board, and sponsor activations tracked through their evidence. SQLite persistence and Tantivy
//! full-text search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod events;
mod models;
mod search;
mod workflow;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;
use events::EventBus;
use models::{ActivationFilter, DeliveryFilter};
use search::SearchIndex;
use workflow::{ActivationWorkflow, AssignmentService, DeliveryWorkflow, EvidenceLedger};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub assignments: AssignmentService,
    pub deliveries: DeliveryWorkflow,
    pub activations: ActivationWorkflow,
    pub evidence: EvidenceLedger,
}

impl AppState {
    /// Wire the workflows onto one repository and event bus.
    pub fn new(
        repo: Arc<Repository>,
        search: Arc<SearchIndex>,
        config: Config,
        events: EventBus,
    ) -> Self {
        let activations = ActivationWorkflow::new(
            repo.clone(),
            events.clone(),
            config.evidence_suggest_threshold,
        );
        Self {
            assignments: AssignmentService::new(repo.clone(), events.clone()),
            deliveries: DeliveryWorkflow::new(repo.clone(), events.clone()),
            evidence: EvidenceLedger::new(repo.clone(), events.clone(), activations.clone()),
            activations,
            repo,
            search,
            config: Arc::new(config),
            events,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!("Starting Production Desk Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (DESK_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let deliveries = repo.list_deliveries(&DeliveryFilter::default()).await?;
    let activations = repo.list_activations(&ActivationFilter::default()).await?;
    search.rebuild(&deliveries, &activations).await?;

    let events = EventBus::new(config.notification_capacity);
    let _event_logger = events::spawn_event_logger(&events);

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, search, config, events);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Members
        .route("/members", get(api::list_members))
        .route("/members", post(api::create_member))
        .route("/members/available", get(api::available_members))
        .route("/members/{id}", get(api::get_member))
        .route("/members/{id}", put(api::update_member))
        .route("/members/{id}", delete(api::delete_member))
        // Assignments
        .route("/assignments", get(api::list_assignments))
        .route("/assignments", post(api::create_assignment))
        .route("/assignments/check", post(api::check_conflicts))
        .route("/assignments/schedule", get(api::member_schedule))
        .route("/assignments/audit", get(api::audit_assignments))
        .route("/assignments/{id}", get(api::get_assignment))
        .route("/assignments/{id}", put(api::update_assignment))
        .route("/assignments/{id}", delete(api::delete_assignment))
        // Deliveries
        .route("/deliveries", get(api::list_deliveries))
        .route("/deliveries", post(api::create_delivery))
        .route("/deliveries/late", get(api::late_deliveries))
        .route("/deliveries/upcoming", get(api::upcoming_deliveries))
        .route("/deliveries/pending-approvals", get(api::pending_approvals))
        .route("/deliveries/stats", get(api::delivery_stats))
        .route("/deliveries/{id}", get(api::get_delivery))
        .route("/deliveries/{id}", put(api::update_delivery))
        .route("/deliveries/{id}", delete(api::delete_delivery))
        .route("/deliveries/{id}/move", post(api::move_delivery))
        .route("/deliveries/{id}/comments", get(api::list_comments))
        .route("/deliveries/{id}/comments", post(api::add_comment))
        // Activations
        .route("/activations", get(api::list_activations))
        .route("/activations", post(api::create_activation))
        .route("/activations/stats", get(api::activation_stats))
        .route("/activations/evidence-counts", get(api::evidence_counts))
        .route("/activations/{id}", get(api::get_activation))
        .route("/activations/{id}", put(api::update_activation))
        .route("/activations/{id}", delete(api::delete_activation))
        .route("/activations/{id}/status", put(api::update_activation_status))
        .route("/activations/{id}/evidence", get(api::list_evidence))
        .route("/activations/{id}/evidence", post(api::add_evidence))
        .route("/activations/{id}/evidence-check", post(api::check_evidence))
        // Evidence
        .route("/evidence/{id}", delete(api::remove_evidence))
        .route("/evidence/{id}/approval", put(api::set_evidence_approval))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route("/notifications", delete(api::clear_notifications))
        .route("/notifications/unread-count", get(api::unread_count))
        .route("/notifications/read-all", post(api::mark_all_notifications_read))
        .route("/notifications/{id}", delete(api::remove_notification))
        .route("/notifications/{id}/read", post(api::mark_notification_read))
        // Search
        .route("/search", get(api::search_records))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
