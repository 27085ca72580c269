//! Pending-change log: proposals against the question collection.
//!
//! Nothing here touches the `questions` table beyond existence checks; rows
//! only change when a pending change is applied.

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{bump_revision, encode_json, fetch_question, Repository};
use crate::errors::AppError;
use crate::models::{
    ChangeType, CreatePendingChangeRequest, DeleteQuestionRequest, PendingChange,
    UpdatePendingChangeRequest,
};
use crate::schema::{self, Mode, QUESTION_FIELDS};
use crate::versioning::now_timestamp;

const SELECT_PENDING: &str =
    "SELECT id, change_type, data, created_at, updated_at FROM pending_changes";

impl Repository {
    /// List the log in application order: `createdAt`, then `id`.
    pub async fn list_pending_changes(&self) -> Result<Vec<PendingChange>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_pending_changes(&mut conn).await
    }

    /// Get a pending change by ID.
    pub async fn get_pending_change(&self, id: &str) -> Result<Option<PendingChange>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_pending_change(&mut conn, id).await
    }

    /// Propose a change.
    ///
    /// Adds are validated in full with defaults filled in. Updates are
    /// validated field by field and folded into an open proposal for the same
    /// question when one exists. Deletes go through [`Repository::delete_question`].
    pub async fn add_pending_change(
        &self,
        request: &CreatePendingChangeRequest,
    ) -> Result<PendingChange, AppError> {
        match request.change_type {
            ChangeType::Add => {
                let data = schema::validate(&request.data, QUESTION_FIELDS, Mode::Complete)?;
                let change = new_change(ChangeType::Add, data);

                let mut tx = self.pool.begin().await?;
                insert_pending_change(&mut tx, &change).await?;
                bump_revision(&mut tx).await?;
                tx.commit().await?;

                tracing::debug!("Queued add {}", change.id);
                Ok(change)
            }
            ChangeType::Update => {
                let data = schema::validate(&request.data, QUESTION_FIELDS, Mode::Partial)?;
                let target = required_target(&data)?;

                let mut tx = self.pool.begin().await?;
                ensure_question_exists(&mut tx, &target).await?;

                let change = match find_open_change_for(&mut tx, &target).await? {
                    Some(mut open) => {
                        open.change_type = ChangeType::Update;
                        open.data.extend(data);
                        open.updated_at = now_timestamp();
                        save_pending_change(&mut tx, &open).await?;
                        tracing::debug!("Merged update for {} into {}", target, open.id);
                        open
                    }
                    None => {
                        let change = new_change(ChangeType::Update, data);
                        insert_pending_change(&mut tx, &change).await?;
                        tracing::debug!("Queued update {} for {}", change.id, target);
                        change
                    }
                };

                bump_revision(&mut tx).await?;
                tx.commit().await?;
                Ok(change)
            }
            ChangeType::Delete => {
                let data = schema::validate(&request.data, QUESTION_FIELDS, Mode::Partial)?;
                let target = required_target(&data)?;
                let extra = DeleteQuestionRequest {
                    updated_change: Some(data),
                };
                self.delete_question(&target, &extra).await
            }
        }
    }

    /// Propose deleting a question.
    ///
    /// An open proposal for the same question absorbs the deletion instead of a
    /// second entry being queued.
    pub async fn delete_question(
        &self,
        delete_id: &str,
        request: &DeleteQuestionRequest,
    ) -> Result<PendingChange, AppError> {
        let mut patch = match &request.updated_change {
            Some(extra) => schema::validate(extra, QUESTION_FIELDS, Mode::Partial)?,
            None => Map::new(),
        };
        patch.insert("id".into(), Value::String(delete_id.to_string()));
        patch.insert("isDeleted".into(), Value::Bool(true));

        let mut tx = self.pool.begin().await?;
        ensure_question_exists(&mut tx, delete_id).await?;

        let change = match find_open_change_for(&mut tx, delete_id).await? {
            Some(mut open) => {
                open.data.extend(patch);
                open.updated_at = now_timestamp();
                save_pending_change(&mut tx, &open).await?;
                tracing::debug!("Merged delete of {} into {}", delete_id, open.id);
                open
            }
            None => {
                let change = new_change(ChangeType::Delete, patch);
                insert_pending_change(&mut tx, &change).await?;
                tracing::debug!("Queued delete {} for {}", change.id, delete_id);
                change
            }
        };

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    /// Patch a pending change in place.
    pub async fn update_pending_change(
        &self,
        id: &str,
        request: &UpdatePendingChangeRequest,
    ) -> Result<PendingChange, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut change = fetch_pending_change(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pending change {} not found", id)))?;

        if let Some(change_type) = request.change_type {
            change.change_type = change_type;
        }
        if let Some(patch) = &request.data {
            let patch = schema::validate(patch, QUESTION_FIELDS, Mode::Partial)?;
            change.data.extend(patch);
        }

        match change.change_type {
            ChangeType::Add => {
                change.data = schema::validate(&change.data, QUESTION_FIELDS, Mode::Complete)?;
            }
            ChangeType::Update | ChangeType::Delete => {
                let target = required_target(&change.data)?;
                ensure_question_exists(&mut tx, &target).await?;
            }
        }
        if change.change_type == ChangeType::Delete {
            change.data.insert("isDeleted".into(), Value::Bool(true));
        }

        change.updated_at = now_timestamp();
        save_pending_change(&mut tx, &change).await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(change)
    }

    /// Remove a pending change without applying it.
    pub async fn delete_pending_change(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        if !remove_pending_change(&mut tx, id).await? {
            return Err(AppError::NotFound(format!(
                "Pending change {} not found",
                id
            )));
        }
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }
}

fn new_change(change_type: ChangeType, data: Map<String, Value>) -> PendingChange {
    let now = now_timestamp();
    PendingChange {
        id: uuid::Uuid::new_v4().to_string(),
        change_type,
        data,
        created_at: now.clone(),
        updated_at: now,
    }
}

fn required_target(data: &Map<String, Value>) -> Result<String, AppError> {
    data.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("Field 'id' is required".to_string()))
}

async fn ensure_question_exists(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    match fetch_question(conn, id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Question {} not found", id))),
    }
}

pub(super) async fn load_pending_changes(
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingChange>, AppError> {
    let sql = format!("{} ORDER BY created_at, id", SELECT_PENDING);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(pending_from_row).collect()
}

pub(super) async fn fetch_pending_change(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<PendingChange>, AppError> {
    let sql = format!("{} WHERE id = ?", SELECT_PENDING);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(pending_from_row).transpose()
}

async fn find_open_change_for(
    conn: &mut SqliteConnection,
    question_id: &str,
) -> Result<Option<PendingChange>, AppError> {
    let sql = format!(
        "{} WHERE target_id = ? ORDER BY created_at, id LIMIT 1",
        SELECT_PENDING
    );
    let row = sqlx::query(&sql)
        .bind(question_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(pending_from_row).transpose()
}

async fn insert_pending_change(
    conn: &mut SqliteConnection,
    change: &PendingChange,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO pending_changes (id, change_type, target_id, data, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&change.id)
    .bind(change.change_type.as_str())
    .bind(change.target_id())
    .bind(encode_json(&change.data)?)
    .bind(&change.created_at)
    .bind(&change.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn save_pending_change(
    conn: &mut SqliteConnection,
    change: &PendingChange,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE pending_changes SET change_type = ?, target_id = ?, data = ?, updated_at = ? WHERE id = ?",
    )
    .bind(change.change_type.as_str())
    .bind(change.target_id())
    .bind(encode_json(&change.data)?)
    .bind(&change.updated_at)
    .bind(&change.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn remove_pending_change(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM pending_changes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn pending_from_row(row: &SqliteRow) -> Result<PendingChange, AppError> {
    let id: String = row.get("id");
    let change_type: String = row.get("change_type");
    let data: String = row.get("data");

    let change_type = ChangeType::from_str(&change_type).ok_or_else(|| {
        AppError::Internal(format!(
            "Pending change {} has invalid type '{}'",
            id, change_type
        ))
    })?;
    let data: Map<String, Value> = serde_json::from_str(&data).map_err(|e| {
        AppError::Internal(format!("Pending change {} has invalid data: {}", id, e))
    })?;

    Ok(PendingChange {
        id,
        change_type,
        data,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
pub(super) async fn insert_raw_pending_change(
    repo: &Repository,
    change: &PendingChange,
) -> Result<(), AppError> {
    let mut conn = repo.pool.acquire().await?;
    insert_pending_change(&mut conn, change).await
}
