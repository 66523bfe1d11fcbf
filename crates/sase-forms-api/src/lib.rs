//! OpenSASE Form Builder API
//!
//! HTTP surface of the form builder: owner endpoints behind a bearer token,
//! the public slug lookup and the public submission endpoint.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use sase_forms::{
    CsvExporter, FormEditor, FormStore, PublishingService, ResponseAggregator, SubmissionService,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub editor: FormEditor,
    pub publishing: PublishingService,
    pub submissions: SubmissionService,
    pub responses: ResponseAggregator,
    pub exporter: CsvExporter,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn FormStore>) -> Self {
        Self {
            editor: FormEditor::new(store.clone()),
            publishing: PublishingService::new(store.clone(), config.slugs.policy()),
            submissions: SubmissionService::new(store.clone(), config.submissions.policy()),
            responses: ResponseAggregator::new(store, config.responses.max_page_size),
            exporter: CsvExporter::new(config.export.clone()),
            config,
        }
    }
}

/// Build the API router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Owner
        .route("/forms", get(routes::forms::list_forms))
        .route("/forms/create", post(routes::forms::create_form))
        .route("/forms/publish", post(routes::publish::publish))
        .route("/forms/:id", get(routes::forms::get_form))
        .route("/forms/:id/save", post(routes::forms::save_form))
        .route("/forms/:id/responses", get(routes::responses::list_responses))
        .route("/forms/:id/export", get(routes::responses::export_csv))
        // Public
        .route("/forms/by-slug/:slug", get(routes::forms::find_by_slug))
        .route("/submit", post(routes::submit::submit))
}
