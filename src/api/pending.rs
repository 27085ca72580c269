//! Pending-change API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, refresh_search_index, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    ApplyReport, CreatePendingChangeRequest, PendingChange, UpdatePendingChangeRequest,
};
use crate::AppState;

/// GET /api/pending-changes - The log in application order.
pub async fn list_pending_changes(State(state): State<AppState>) -> ApiResult<Vec<PendingChange>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_pending_changes().await {
        Ok(changes) => success(changes, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/pending-changes/:id - Get a single pending change.
pub async fn get_pending_change(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PendingChange> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_pending_change(&id).await {
        Ok(Some(change)) => success(change, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Pending change {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/pending-changes - Propose an add, update or delete.
pub async fn create_pending_change(
    State(state): State<AppState>,
    Json(request): Json<CreatePendingChangeRequest>,
) -> ApiResult<PendingChange> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.add_pending_change(&request).await {
        Ok(change) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(change, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/pending-changes/:id - Patch a pending change.
pub async fn update_pending_change(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePendingChangeRequest>,
) -> ApiResult<PendingChange> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_pending_change(&id, &request).await {
        Ok(change) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(change, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/pending-changes/:id - Discard a pending change.
pub async fn delete_pending_change(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_pending_change(&id).await {
        Ok(removed) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(removed, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/pending-changes/:id/apply - Apply one entry.
pub async fn apply_pending_change(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApplyReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.apply_pending_change(&id).await {
        Ok(report) => {
            refresh_search_index(&state).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(report, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/pending-changes/apply-all - Drain both queues in one batch.
pub async fn apply_all_pending_changes(State(state): State<AppState>) -> ApiResult<ApplyReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.apply_all_pending_changes().await {
        Ok(report) => {
            refresh_search_index(&state).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(report, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
