//! Axum router construction for the feed API.
//!
//! Assembles the probe and feed routes into a single [`Router`] with CORS
//! and per-request tracing.

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the feed server.
///
/// The router includes:
/// - `GET /api/v1/liveness` -- liveness probe
/// - `GET /api/v1/readiness` -- readiness probe
/// - `POST /ui/v1/posts` -- create a post
/// - `GET /ui/v1/posts` -- list posts
/// - `GET /ui/v1/posts/{id}` -- single post with comments
/// - `DELETE /ui/v1/posts/{id}` -- delete a post
/// - `POST /ui/v1/posts/{id}/comment` -- comment on a post
///
/// CORS allows any origin with the methods and headers the frontend uses.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Probes
        .route("/api/v1/liveness", get(handlers::liveness))
        .route("/api/v1/readiness", get(handlers::readiness))
        // Feed
        .route(
            "/ui/v1/posts",
            post(handlers::create_post).get(handlers::list_posts),
        )
        .route(
            "/ui/v1/posts/{id}",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        .route("/ui/v1/posts/{id}/comment", post(handlers::add_comment))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
