//! Linked-question edit model.

use serde::{Deserialize, Serialize};

/// Queued instruction replacing the complete link set of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedQuestionEdit {
    pub id: String,
    pub question_id: String,
    pub linked_question_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for queuing or replacing a link edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedQuestionsRequest {
    pub question_id: String,
    #[serde(default)]
    pub linked_question_ids: Vec<String>,
}
