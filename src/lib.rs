//! Momoscan - pre-market momentum scanner

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use axum::Router;
use config::Config;
use services::{ResultSink, Scanner};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when startup configuration was incomplete.
    pub scanner: Option<Arc<Scanner>>,
    pub sink: Arc<dyn ResultSink>,
    /// Why the scanner is disabled, if it is.
    pub startup_error: Option<String>,
}

/// Build the HTTP application with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
