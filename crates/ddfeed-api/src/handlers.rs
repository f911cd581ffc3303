//! REST endpoint handlers for the feed API.
//!
//! Every feed handler delegates to the shared
//! [`FeedCoordinator`](ddfeed_core::FeedCoordinator) in [`AppState`].
//! Request bodies are decoded before the coordinator is called, so a
//! malformed body never reaches either store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/v1/liveness` | Process is up |
//! | `GET` | `/api/v1/readiness` | Store reachable and schema usable |
//! | `POST` | `/ui/v1/posts` | Create a post |
//! | `GET` | `/ui/v1/posts` | List posts (`?limit=&cursor=`) |
//! | `GET` | `/ui/v1/posts/{id}` | Single post with comments |
//! | `DELETE` | `/ui/v1/posts/{id}` | Delete a post |
//! | `POST` | `/ui/v1/posts/{id}/comment` | Comment on a post |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use ddfeed_types::{Comment, NewComment, NewPost, Post, PostPage};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /ui/v1/posts` endpoint.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListQuery {
    /// Requested page size. Anything that is not an integer falls back to
    /// the default.
    pub limit: Option<String>,
    /// Id of the last post on the previous page.
    #[serde(alias = "last_uuid")]
    pub cursor: Option<String>,
}

impl ListQuery {
    /// The requested page size, if it parses.
    pub fn requested_limit(&self) -> Option<i64> {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Report that the process is serving requests.
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Report whether the store is reachable and carries the expected schema.
pub async fn readiness(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.feed.check_store().await?;
    Ok(Json(serde_json::json!({ "status": "ready" })))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Create a post from `{"body": string}`.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewPost>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let Json(new_post) = payload?;
    let post = state.feed.create_post(&new_post.body).await?;
    Ok(Json(post))
}

/// List one page of posts, newest first.
///
/// # Query Parameters
///
/// - `limit`: page size, clamped to `1..=100` (default 10)
/// - `cursor` (or `last_uuid`): id of the last post already seen
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<PostPage>, ApiError> {
    let page = state
        .feed
        .list_posts(params.requested_limit(), params.cursor.as_deref())
        .await?;
    Ok(Json(page))
}

/// Return one post with all of its comments.
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let post = state.feed.get_post(&id).await?;
    Ok(Json(post))
}

/// Delete a post. Succeeds whether or not the post existed.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.feed.delete_post(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Add a comment from `{"body": string}` to the post at `{id}`.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Json(new_comment) = payload?;
    let comment = state.feed.add_comment(&id, &new_comment.body).await?;
    Ok(Json(comment))
}
