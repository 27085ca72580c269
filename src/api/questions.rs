//! Question API endpoints.
//!
//! Questions are read-only here; every write goes through the pending-change log.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{DeleteQuestionRequest, NextSerial, NextSerialQuery, PendingChange, Question};
use crate::versioning::ApplyContext;
use crate::AppState;

/// GET /api/questions - All rows, including deleted and archived versions.
pub async fn list_questions(State(state): State<AppState>) -> ApiResult<Vec<Question>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_questions().await {
        Ok(questions) => success(questions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/questions/:id - Get a single question row.
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Question> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_question(&id).await {
        Ok(Some(question)) => success(question, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Question {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/questions/:id/history - Version lineage, newest first.
pub async fn get_question_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Question>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.question_history(&id).await {
        Ok(history) => success(history, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/questions/next-serial - Next serial number for a unit and year.
pub async fn get_next_serial(
    State(state): State<AppState>,
    Query(params): Query<NextSerialQuery>,
) -> ApiResult<NextSerial> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let year = params.year.unwrap_or_else(|| ApplyContext::current().year);

    match state.repo.next_serial_number(params.unit_name, year).await {
        Ok(serial_number) => success(
            NextSerial {
                unit_name: params.unit_name,
                year,
                serial_number,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/questions/:id/propose-delete - Queue a soft delete.
pub async fn propose_delete_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DeleteQuestionRequest>,
) -> ApiResult<PendingChange> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_question(&id, &request).await {
        Ok(change) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(change, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
