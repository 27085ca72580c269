//! Linked-question edit API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{LinkedQuestionEdit, LinkedQuestionsRequest};
use crate::AppState;

/// GET /api/linked-questions - Queued link edits.
pub async fn list_linked_questions(
    State(state): State<AppState>,
) -> ApiResult<Vec<LinkedQuestionEdit>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_linked_question_edits().await {
        Ok(edits) => success(edits, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/linked-questions - Queue the desired link set for a question.
pub async fn add_linked_questions(
    State(state): State<AppState>,
    Json(request): Json<LinkedQuestionsRequest>,
) -> ApiResult<LinkedQuestionEdit> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.add_linked_questions(&request).await {
        Ok(edit) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(edit, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/linked-questions/:id - Replace a queued edit.
pub async fn update_linked_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LinkedQuestionsRequest>,
) -> ApiResult<LinkedQuestionEdit> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_linked_questions(&id, &request).await {
        Ok(edit) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(edit, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/linked-questions/by-question/:question_id - Drop a queued edit.
pub async fn delete_linked_questions(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_linked_questions(&question_id).await {
        Ok(true) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Ok(false) => error(
            AppError::NotFound(format!(
                "No linked question edit queued for {}",
                question_id
            )),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
