//! Syllabus section CRUD.

use sqlx::Row;

use super::repository::Repository;
use crate::errors::AppError;
use crate::models::{
    CreateSyllabusSectionRequest, SyllabusSection, UnitName, UpdateSyllabusSectionRequest,
};
use crate::schema::{self, Mode, SYLLABUS_SECTION_FIELDS};
use crate::versioning::now_timestamp;

impl Repository {
    /// List all syllabus sections.
    pub async fn list_syllabus_sections(&self) -> Result<Vec<SyllabusSection>, AppError> {
        let rows = sqlx::query(
            "SELECT id, unit_name, name, description, weightage, created_at, updated_at, version FROM syllabus_sections ORDER BY unit_name, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(section_from_row).collect()
    }

    /// Get a syllabus section by ID.
    pub async fn get_syllabus_section(&self, id: &str) -> Result<Option<SyllabusSection>, AppError> {
        let row = sqlx::query(
            "SELECT id, unit_name, name, description, weightage, created_at, updated_at, version FROM syllabus_sections WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(section_from_row).transpose()
    }

    /// Create a new syllabus section.
    pub async fn create_syllabus_section(
        &self,
        request: &CreateSyllabusSectionRequest,
    ) -> Result<SyllabusSection, AppError> {
        let record = serde_json::to_value(request)?;
        let record = record
            .as_object()
            .ok_or_else(|| AppError::BadRequest("Expected an object".to_string()))?;
        let checked = schema::validate(record, SYLLABUS_SECTION_FIELDS, Mode::Complete)?;
        let weightage = checked
            .get("weightage")
            .and_then(|w| w.as_i64())
            .unwrap_or(0);

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO syllabus_sections (id, unit_name, name, description, weightage, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.unit_name.as_str())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(weightage)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(SyllabusSection {
            id,
            unit_name: request.unit_name,
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            weightage,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update a syllabus section.
    pub async fn update_syllabus_section(
        &self,
        id: &str,
        request: &UpdateSyllabusSectionRequest,
    ) -> Result<SyllabusSection, AppError> {
        let record = serde_json::to_value(request)?;
        if let Some(record) = record.as_object() {
            schema::validate(record, SYLLABUS_SECTION_FIELDS, Mode::Partial)?;
        }

        let existing = self
            .get_syllabus_section(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Syllabus section {} not found", id)))?;

        let now = now_timestamp();
        let new_version = existing.version + 1;

        let unit_name = request.unit_name.unwrap_or(existing.unit_name);
        let name = request
            .name
            .as_ref()
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.name);
        let description = request.description.clone().or(existing.description);
        let weightage = request.weightage.unwrap_or(existing.weightage);

        let result = sqlx::query(
            "UPDATE syllabus_sections SET unit_name = ?, name = ?, description = ?, weightage = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(unit_name.as_str())
        .bind(&name)
        .bind(&description)
        .bind(weightage)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Syllabus section {} changed or removed concurrently",
                id
            )));
        }

        self.increment_revision().await?;

        Ok(SyllabusSection {
            id: id.to_string(),
            unit_name,
            name,
            description,
            weightage,
            created_at: existing.created_at,
            updated_at: now,
            version: new_version,
        })
    }

    /// Delete a syllabus section.
    pub async fn delete_syllabus_section(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM syllabus_sections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Syllabus section {} not found",
                id
            )));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn section_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SyllabusSection, AppError> {
    let id: String = row.get("id");
    let unit_name: String = row.get("unit_name");
    let unit_name = UnitName::from_str(&unit_name).ok_or_else(|| {
        AppError::Internal(format!(
            "Syllabus section {} has invalid unit_name '{}'",
            id, unit_name
        ))
    })?;

    Ok(SyllabusSection {
        id,
        unit_name,
        name: row.get("name"),
        description: row.get("description"),
        weightage: row.get("weightage"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}
