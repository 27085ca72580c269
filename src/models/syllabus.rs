//! Syllabus section model.

use serde::{Deserialize, Serialize};

use super::UnitName;

/// A syllabus section grouping questions of one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusSection {
    pub id: String,
    pub unit_name: UnitName,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Share of the paper's marks, in percent
    pub weightage: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a new syllabus section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSyllabusSectionRequest {
    pub unit_name: UnitName,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weightage: Option<i64>,
}

/// Request body for updating an existing syllabus section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSyllabusSectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<UnitName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weightage: Option<i64>,
}
