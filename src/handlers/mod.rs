pub mod convert;
pub mod health;
pub mod index;

pub use convert::*;
pub use health::*;
pub use index::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::middleware::{logging_middleware, rate_limit_middleware, RequestLimiter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RequestLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let limiter = RequestLimiter::new(config.max_concurrent_requests);
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
        }
    }
}

/// Only `public_dir` is served statically; the staging root never is.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();
    let public_dir = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/convert", post(convert_handler))
        .route("/health", get(health_handler))
        .route("/health/details", get(health_details_handler))
        .fallback_service(public_dir)
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn(logging_middleware)),
        )
        .with_state(state)
}
