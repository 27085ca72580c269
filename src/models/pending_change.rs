//! Pending change model: a proposed mutation of the question collection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "add" => Some(ChangeType::Add),
            "update" => Some(ChangeType::Update),
            "delete" => Some(ChangeType::Delete),
            _ => None,
        }
    }
}

/// A queued proposal. `data` is a full (add) or partial (update/delete)
/// question payload in the camelCase wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl PendingChange {
    /// Question id this change targets; adds have none.
    pub fn target_id(&self) -> Option<&str> {
        match self.change_type {
            ChangeType::Add => None,
            ChangeType::Update | ChangeType::Delete => self.data.get("id").and_then(Value::as_str),
        }
    }

    /// True when the payload explicitly marks the question deleted.
    pub fn marks_deleted(&self) -> bool {
        self.data
            .get("isDeleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Request body for proposing a change.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePendingChangeRequest {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Request body for patching a pending change in place.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePendingChangeRequest {
    #[serde(default, rename = "type")]
    pub change_type: Option<ChangeType>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// Request body for proposing the deletion of a question.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuestionRequest {
    /// Extra payload fields recorded with the deletion.
    #[serde(default)]
    pub updated_change: Option<Map<String, Value>>,
}

/// What applying one pending change did to the question collection.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AppliedKind {
    Created,
    Superseded,
    SoftDeleted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChange {
    pub change_id: String,
    pub kind: AppliedKind,
    /// Row written: the new row for creations and supersessions, the
    /// flagged row for soft deletes.
    pub question_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedChange {
    pub change_id: String,
    pub reason: String,
}

/// Outcome of an apply run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub applied: Vec<AppliedChange>,
    pub skipped: Vec<SkippedChange>,
    pub links_updated: usize,
}
