use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{analytics_handler, health_handler, redirect_handler, shorten_handler};
use crate::middleware::rate_limit;
use crate::state::AppState;

pub struct App {}

impl App {
    /// Every route except `/health` passes the rate limiter first.
    pub fn router(state: AppState) -> Router {
        let limited = Router::new()
            .route("/shorten", post(shorten_handler))
            .route("/analytics/{short_id}", get(analytics_handler))
            .route("/{short_id}", get(redirect_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

        Router::new()
            .route("/health", get(health_handler))
            .merge(limited)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
