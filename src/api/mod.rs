//! REST API module.
//!
//! Handlers for questions, the pending-change log, linked-question edits,
//! syllabus sections and search. Every response carries the store revision.

mod datastore;
mod links;
mod pending;
mod questions;
mod search;
mod syllabus;

pub use datastore::*;
pub use links::*;
pub use pending::*;
pub use questions::*;
pub use search::*;
pub use syllabus::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Rebuild the search index from the current question rows.
///
/// Failures are logged; the write that triggered the rebuild has already
/// committed.
pub(crate) async fn refresh_search_index(state: &AppState) {
    match state.repo.list_active_questions().await {
        Ok(questions) => {
            if let Err(e) = state.search.rebuild(&questions).await {
                tracing::warn!("Failed to rebuild search index: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to load questions for indexing: {}", e),
    }
}
