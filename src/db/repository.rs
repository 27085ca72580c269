//! Database repository: revision bookkeeping and question reads.
//!
//! Write paths live in sibling modules as further `impl Repository` blocks.
//! Helpers that take a `&mut SqliteConnection` run on whatever connection or
//! transaction the caller hands them.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Datastore, DifficultyLevel, Question, QuestionType, RevisionInfo, UnitName,
};
use crate::versioning::now_timestamp;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        bump_revision(&mut conn).await?;
        self.get_revision_id().await
    }

    /// Get the full datastore.
    pub async fn get_datastore(&self) -> Result<Datastore, AppError> {
        let meta =
            sqlx::query("SELECT schema_version, revision_id, generated_at FROM meta WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;

        let questions = self.list_questions().await?;
        let pending_changes = self.list_pending_changes().await?;
        let linked_question_edits = self.list_linked_question_edits().await?;
        let syllabus_sections = self.list_syllabus_sections().await?;

        Ok(Datastore {
            schema_version: meta.get("schema_version"),
            revision_id: meta.get("revision_id"),
            generated_at: meta.get("generated_at"),
            questions,
            pending_changes,
            linked_question_edits,
            syllabus_sections,
        })
    }

    // ==================== QUESTION READS ====================

    /// List every question row, including deleted and archived versions.
    pub async fn list_questions(&self) -> Result<Vec<Question>, AppError> {
        let sql = format!(
            "{} ORDER BY unit_name, year, serial_number",
            SELECT_QUESTIONS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(question_from_row).collect()
    }

    /// List the rows normal views show: latest, not deleted.
    pub async fn list_active_questions(&self) -> Result<Vec<Question>, AppError> {
        let sql = format!(
            "{} WHERE is_deleted = 0 AND is_latest_version = 1 ORDER BY unit_name, year, serial_number",
            SELECT_QUESTIONS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(question_from_row).collect()
    }

    /// Get a question row by ID.
    pub async fn get_question(&self, id: &str) -> Result<Option<Question>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_question(&mut conn, id).await
    }

    /// The version lineage ending at `id`, newest first.
    pub async fn question_history(&self, id: &str) -> Result<Vec<Question>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let mut lineage = Vec::new();
        let mut cursor = Some(id.to_string());

        while let Some(current_id) = cursor {
            let Some(row) = fetch_question(&mut conn, &current_id).await? else {
                break;
            };
            // Guard against a corrupted chain looping back on itself.
            if lineage.iter().any(|q: &Question| q.id == row.id) {
                tracing::warn!("Version chain of question {} loops at {}", id, row.id);
                break;
            }
            cursor = row.previous_version_id.clone();
            lineage.push(row);
        }

        if lineage.is_empty() {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }
        Ok(lineage)
    }
}

// Connection-level helpers shared by the write paths

pub(super) const SELECT_QUESTIONS: &str = r#"SELECT id, unit_name, year, serial_number, syllabus_section_id,
        question_type, question_text, answer_text, answer_list, correct_option,
        match_pairs, marks, difficulty_level, mandatory, image,
        is_deleted, is_latest_version, previous_version_id, archived_at,
        created_at, updated_at, linked_question
    FROM questions"#;

pub(super) async fn fetch_question(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Question>, AppError> {
    let sql = format!("{} WHERE id = ?", SELECT_QUESTIONS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(question_from_row).transpose()
}

pub(super) async fn insert_question(
    conn: &mut SqliteConnection,
    question: &Question,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO questions (
            id, unit_name, year, serial_number, syllabus_section_id,
            question_type, question_text, answer_text, answer_list, correct_option,
            match_pairs, marks, difficulty_level, mandatory, image,
            is_deleted, is_latest_version, previous_version_id, archived_at,
            created_at, updated_at, linked_question
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&question.id)
    .bind(question.unit_name.as_str())
    .bind(question.year)
    .bind(question.serial_number)
    .bind(&question.syllabus_section_id)
    .bind(question.question_type.as_str())
    .bind(&question.question_text)
    .bind(&question.answer_text)
    .bind(encode_json(&question.answer_list)?)
    .bind(&question.correct_option)
    .bind(encode_json(&question.match_pairs)?)
    .bind(question.marks)
    .bind(question.difficulty_level.as_str())
    .bind(question.mandatory as i32)
    .bind(&question.image)
    .bind(question.is_deleted as i32)
    .bind(question.is_latest_version as i32)
    .bind(&question.previous_version_id)
    .bind(&question.archived_at)
    .bind(&question.created_at)
    .bind(&question.updated_at)
    .bind(encode_json(&question.linked_question)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Write every column of an existing row back.
pub(super) async fn write_question(
    conn: &mut SqliteConnection,
    question: &Question,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"UPDATE questions SET
            unit_name = ?, year = ?, serial_number = ?, syllabus_section_id = ?,
            question_type = ?, question_text = ?, answer_text = ?, answer_list = ?,
            correct_option = ?, match_pairs = ?, marks = ?, difficulty_level = ?,
            mandatory = ?, image = ?, is_deleted = ?, is_latest_version = ?,
            previous_version_id = ?, archived_at = ?, created_at = ?, updated_at = ?,
            linked_question = ?
        WHERE id = ?"#,
    )
    .bind(question.unit_name.as_str())
    .bind(question.year)
    .bind(question.serial_number)
    .bind(&question.syllabus_section_id)
    .bind(question.question_type.as_str())
    .bind(&question.question_text)
    .bind(&question.answer_text)
    .bind(encode_json(&question.answer_list)?)
    .bind(&question.correct_option)
    .bind(encode_json(&question.match_pairs)?)
    .bind(question.marks)
    .bind(question.difficulty_level.as_str())
    .bind(question.mandatory as i32)
    .bind(&question.image)
    .bind(question.is_deleted as i32)
    .bind(question.is_latest_version as i32)
    .bind(&question.previous_version_id)
    .bind(&question.archived_at)
    .bind(&question.created_at)
    .bind(&question.updated_at)
    .bind(encode_json(&question.linked_question)?)
    .bind(&question.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Question {} not found",
            question.id
        )));
    }
    Ok(())
}

pub(super) async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now_timestamp())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode column: {}", e)))
}

pub(super) fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn question_from_row(row: &SqliteRow) -> Result<Question, AppError> {
    let id: String = row.get("id");
    let unit_name: String = row.get("unit_name");
    let question_type: String = row.get("question_type");
    let difficulty_level: String = row.get("difficulty_level");
    let answer_list: String = row.get("answer_list");
    let match_pairs: String = row.get("match_pairs");
    let linked_question: String = row.get("linked_question");
    let mandatory: i32 = row.get("mandatory");
    let is_deleted: i32 = row.get("is_deleted");
    let is_latest_version: i32 = row.get("is_latest_version");

    let corrupt = |column: &str, value: &str| {
        AppError::Internal(format!(
            "Question {} has invalid {} '{}'",
            id, column, value
        ))
    };
    let unit_name =
        UnitName::from_str(&unit_name).ok_or_else(|| corrupt("unit_name", &unit_name))?;
    let question_type = QuestionType::from_str(&question_type)
        .ok_or_else(|| corrupt("question_type", &question_type))?;
    let difficulty_level = DifficultyLevel::from_str(&difficulty_level)
        .ok_or_else(|| corrupt("difficulty_level", &difficulty_level))?;

    Ok(Question {
        id,
        unit_name,
        year: row.get("year"),
        serial_number: row.get("serial_number"),
        syllabus_section_id: row.get("syllabus_section_id"),
        question_type,
        question_text: row.get("question_text"),
        answer_text: row.get("answer_text"),
        answer_list: parse_json_array(&answer_list),
        correct_option: row.get("correct_option"),
        match_pairs: serde_json::from_str(&match_pairs).unwrap_or_default(),
        marks: row.get("marks"),
        difficulty_level,
        mandatory: mandatory != 0,
        image: row.get("image"),
        is_deleted: is_deleted != 0,
        is_latest_version: is_latest_version != 0,
        previous_version_id: row.get("previous_version_id"),
        archived_at: row.get("archived_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        linked_question: parse_json_array(&linked_question),
    })
}
