//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for the question bank and its change queues.

mod apply;
mod links;
mod pending;
mod repository;
mod syllabus;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            unit_name TEXT NOT NULL,
            year INTEGER NOT NULL,
            serial_number INTEGER NOT NULL,
            syllabus_section_id TEXT,
            question_type TEXT NOT NULL,
            question_text TEXT NOT NULL,
            answer_text TEXT NOT NULL DEFAULT '',
            answer_list TEXT NOT NULL DEFAULT '[]',
            correct_option TEXT,
            match_pairs TEXT NOT NULL DEFAULT '[]',
            marks INTEGER NOT NULL DEFAULT 0,
            difficulty_level TEXT NOT NULL,
            mandatory INTEGER NOT NULL DEFAULT 0,
            image BLOB,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_latest_version INTEGER NOT NULL DEFAULT 1,
            previous_version_id TEXT,
            archived_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            linked_question TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_changes (
            id TEXT PRIMARY KEY,
            change_type TEXT NOT NULL,
            target_id TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS linked_question_edits (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL UNIQUE,
            linked_question_ids TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS syllabus_sections (
            id TEXT PRIMARY KEY,
            unit_name TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            weightage INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Serial lookups read this index newest-first; the unique index rejects
    // a colliding serial and with it the whole apply transaction.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_questions_unit_year ON questions(unit_name, year, serial_number DESC);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_questions_serial ON questions(unit_name, year, serial_number);
        CREATE INDEX IF NOT EXISTS idx_questions_previous ON questions(previous_version_id);
        CREATE INDEX IF NOT EXISTS idx_pending_changes_target ON pending_changes(target_id);
        CREATE INDEX IF NOT EXISTS idx_pending_changes_order ON pending_changes(created_at, id);
        CREATE INDEX IF NOT EXISTS idx_syllabus_sections_unit ON syllabus_sections(unit_name, name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
