//! Linked-question edit queue.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{
    bump_revision, encode_json, fetch_question, parse_json_array, Repository,
};
use crate::errors::AppError;
use crate::models::{LinkedQuestionEdit, LinkedQuestionsRequest};
use crate::schema::{self, Mode, LINKED_QUESTION_EDIT_FIELDS};
use crate::versioning::now_timestamp;

const SELECT_LINK_EDITS: &str =
    "SELECT id, question_id, linked_question_ids, created_at, updated_at FROM linked_question_edits";

impl Repository {
    pub async fn list_linked_question_edits(&self) -> Result<Vec<LinkedQuestionEdit>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_link_edits(&mut conn).await
    }

    /// Queue the complete desired link set for a question, replacing any edit
    /// already queued for it.
    pub async fn add_linked_questions(
        &self,
        request: &LinkedQuestionsRequest,
    ) -> Result<LinkedQuestionEdit, AppError> {
        let linked_question_ids = normalize_request(request)?;

        let mut tx = self.pool.begin().await?;
        if fetch_question(&mut tx, &request.question_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Question {} not found",
                request.question_id
            )));
        }

        let now = now_timestamp();
        sqlx::query(
            r#"INSERT INTO linked_question_edits (id, question_id, linked_question_ids, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(question_id) DO UPDATE SET
                   linked_question_ids = excluded.linked_question_ids,
                   updated_at = excluded.updated_at"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&request.question_id)
        .bind(encode_json(&linked_question_ids)?)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let edit = fetch_link_edit_for(&mut tx, &request.question_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Link edit for {} vanished after write",
                    request.question_id
                ))
            })?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(edit)
    }

    /// Replace a queued edit by its own ID.
    pub async fn update_linked_questions(
        &self,
        id: &str,
        request: &LinkedQuestionsRequest,
    ) -> Result<LinkedQuestionEdit, AppError> {
        let linked_question_ids = normalize_request(request)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!("{} WHERE id = ?", SELECT_LINK_EDITS);
        let existing = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .as_ref()
            .map(link_edit_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Linked question edit {} not found", id)))?;

        if fetch_question(&mut tx, &request.question_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Question {} not found",
                request.question_id
            )));
        }
        if let Some(other) = fetch_link_edit_for(&mut tx, &request.question_id).await? {
            if other.id != existing.id {
                return Err(AppError::Validation(format!(
                    "Question {} already has queued link edit {}",
                    request.question_id, other.id
                )));
            }
        }

        let now = now_timestamp();
        sqlx::query(
            "UPDATE linked_question_edits SET question_id = ?, linked_question_ids = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&request.question_id)
        .bind(encode_json(&linked_question_ids)?)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(LinkedQuestionEdit {
            id: existing.id,
            question_id: request.question_id.clone(),
            linked_question_ids,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Drop the queued edit for a question. Returns false when none was queued.
    pub async fn delete_linked_questions(&self, question_id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM linked_question_edits WHERE question_id = ?")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }
}

/// Validate a request and return its link ids without duplicates or self-links.
fn normalize_request(request: &LinkedQuestionsRequest) -> Result<Vec<String>, AppError> {
    let record = serde_json::to_value(request)?;
    if let Some(record) = record.as_object() {
        schema::validate(record, LINKED_QUESTION_EDIT_FIELDS, Mode::Complete)?;
    }

    let mut ids: Vec<String> = Vec::with_capacity(request.linked_question_ids.len());
    for id in &request.linked_question_ids {
        if id != &request.question_id && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    Ok(ids)
}

pub(super) async fn load_link_edits(
    conn: &mut SqliteConnection,
) -> Result<Vec<LinkedQuestionEdit>, AppError> {
    let sql = format!("{} ORDER BY created_at, id", SELECT_LINK_EDITS);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(link_edit_from_row).collect())
}

pub(super) async fn clear_link_edits(conn: &mut SqliteConnection) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM linked_question_edits")
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn fetch_link_edit_for(
    conn: &mut SqliteConnection,
    question_id: &str,
) -> Result<Option<LinkedQuestionEdit>, AppError> {
    let sql = format!("{} WHERE question_id = ?", SELECT_LINK_EDITS);
    let row = sqlx::query(&sql)
        .bind(question_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(link_edit_from_row))
}

fn link_edit_from_row(row: &SqliteRow) -> LinkedQuestionEdit {
    let linked: String = row.get("linked_question_ids");
    LinkedQuestionEdit {
        id: row.get("id"),
        question_id: row.get("question_id"),
        linked_question_ids: parse_json_array(&linked),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
