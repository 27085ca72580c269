//! Syllabus section API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSyllabusSectionRequest, SyllabusSection, UpdateSyllabusSectionRequest};
use crate::AppState;

/// GET /api/syllabus-sections - List all sections.
pub async fn list_syllabus_sections(
    State(state): State<AppState>,
) -> ApiResult<Vec<SyllabusSection>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_syllabus_sections().await {
        Ok(sections) => success(sections, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/syllabus-sections/:id - Get a single section.
pub async fn get_syllabus_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SyllabusSection> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_syllabus_section(&id).await {
        Ok(Some(section)) => success(section, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Syllabus section {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/syllabus-sections - Create a section.
pub async fn create_syllabus_section(
    State(state): State<AppState>,
    Json(request): Json<CreateSyllabusSectionRequest>,
) -> ApiResult<SyllabusSection> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.create_syllabus_section(&request).await {
        Ok(section) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(section, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/syllabus-sections/:id - Update a section.
pub async fn update_syllabus_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSyllabusSectionRequest>,
) -> ApiResult<SyllabusSection> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_syllabus_section(&id, &request).await {
        Ok(section) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(section, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/syllabus-sections/:id - Delete a section.
pub async fn delete_syllabus_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_syllabus_section(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
