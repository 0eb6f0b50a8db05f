//! # UelloGent - customer-support chat backend
//!
//! UelloGent routes user messages to one of two LLM-backed agents:
//!
//! - **Support agent**: drives a hosted model's function calling to verify
//!   accounts, send password reset links and resolve credit top-ups
//! - **Query agent**: answers product questions from a vector index of
//!   scraped documentation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use uellogent::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let settings = Settings::new()?;
//!
//!     // Server will start on configured host:port
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! UelloGent follows Hexagonal Architecture:
//! - **Agents**: conversation loops and the ports they depend on
//! - **Adapters**: HTTP handlers, session registry, support tools
//! - **Retrieval**: embeddings, vector index and ingestion
//! - **Persistence**: the message audit log
//! - **Config**: Configuration management

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod persistence;
pub mod retrieval;

use crate::adapters::api_handler::{self, AppState};
use crate::adapters::health_handler::HealthHandler;
use crate::adapters::rate_limit::{rate_limit_middleware, SharedRateLimiter};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `state` - Agents, stores and admin key shared by the API handlers
/// * `health_handler` - Health check handler
/// * `rate_limiter` - Per-client daily quota applied to every non-health route
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(
    state: AppState,
    health_handler: Arc<HealthHandler>,
    rate_limiter: Option<SharedRateLimiter>,
) -> Router {
    // Public routes (never rate limited)
    let public_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }));

    let mut api_router = Router::new()
        .route("/", get(api_handler::root))
        // Support agent
        .route("/agent/support/chat", post(api_handler::support_chat))
        .route("/agent/support/chat/messages/:admin_key", get(api_handler::support_messages))
        .route("/agent/sessions/support/:session_id", delete(api_handler::delete_support_session))
        // Query agent
        .route("/agent/query/chat", post(api_handler::query_chat))
        .route("/agent/query/chat/messages/:admin_key", get(api_handler::query_messages))
        .route("/agent/sessions/query/:session_id", delete(api_handler::delete_query_session))
        // Ingestion
        .route("/scraper", post(api_handler::scraper))
        .with_state(state);

    if let Some(limiter) = rate_limiter {
        api_router = api_router.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    public_router
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
