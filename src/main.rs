//! Question Bank Backend
//!
//! Local service for the examination question bank: a pending-change log with
//! versioned apply, linked-question reconciliation and serial numbering, over
//! SQLite persistence and Tantivy full-text search.

mod api;
mod config;
mod db;
mod errors;
mod models;
mod schema;
mod search;
mod versioning;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Question Bank Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    tracing::info!("Building search index...");
    let questions = repo.list_active_questions().await?;
    search.rebuild(&questions).await?;

    let pending = repo.list_pending_changes().await?;
    if !pending.is_empty() {
        tracing::info!("{} pending changes awaiting review", pending.len());
    }

    let state = AppState { repo, search };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // The web-view runs on another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Datastore
        .route("/datastore", get(api::get_datastore))
        .route("/datastore/revision", get(api::get_revision))
        // Questions
        .route("/questions", get(api::list_questions))
        .route("/questions/next-serial", get(api::get_next_serial))
        .route("/questions/{id}", get(api::get_question))
        .route("/questions/{id}/history", get(api::get_question_history))
        .route(
            "/questions/{id}/propose-delete",
            post(api::propose_delete_question),
        )
        // Pending changes
        .route(
            "/pending-changes",
            get(api::list_pending_changes).post(api::create_pending_change),
        )
        .route(
            "/pending-changes/apply-all",
            post(api::apply_all_pending_changes),
        )
        .route(
            "/pending-changes/{id}",
            get(api::get_pending_change)
                .put(api::update_pending_change)
                .delete(api::delete_pending_change),
        )
        .route(
            "/pending-changes/{id}/apply",
            post(api::apply_pending_change),
        )
        // Linked questions
        .route(
            "/linked-questions",
            get(api::list_linked_questions).post(api::add_linked_questions),
        )
        .route("/linked-questions/{id}", put(api::update_linked_questions))
        .route(
            "/linked-questions/by-question/{question_id}",
            delete(api::delete_linked_questions),
        )
        // Syllabus sections
        .route(
            "/syllabus-sections",
            get(api::list_syllabus_sections).post(api::create_syllabus_section),
        )
        .route(
            "/syllabus-sections/{id}",
            get(api::get_syllabus_section)
                .put(api::update_syllabus_section)
                .delete(api::delete_syllabus_section),
        )
        // Search
        .route("/search", get(api::search_questions));

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
