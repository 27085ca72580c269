//! Datastore model matching the frontend Datastore interface.

use serde::{Deserialize, Serialize};

use super::{LinkedQuestionEdit, PendingChange, Question, SyllabusSection};

/// Snapshot of every collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    pub schema_version: i32,
    pub generated_at: String,
    pub revision_id: i64,
    pub questions: Vec<Question>,
    pub pending_changes: Vec<PendingChange>,
    pub linked_question_edits: Vec<LinkedQuestionEdit>,
    pub syllabus_sections: Vec<SyllabusSection>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}
