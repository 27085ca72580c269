//! Declarative record validation.
//!
//! Every write path runs its payload through [`validate`] with the field table
//! of the entity it targets. Tables live next to the validator so the shape of
//! each collection is readable in one place.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::models::{DifficultyLevel, QuestionType, UnitName};

/// How a field value is checked.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    NonEmptyText,
    Integer { min: i64 },
    Boolean,
    TextList,
    OneOf(&'static [&'static str]),
    /// Array of integers in 0..=255.
    Bytes,
    /// Array of `{ "left": string, "right": string }` objects.
    MatchPairs,
    /// RFC 3339 timestamp string.
    Timestamp,
}

/// One row of a field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<fn() -> Value>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            nullable: false,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, default: fn() -> Value) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: false,
            default: Some(default),
        }
    }

    /// Optional, accepts `null`, defaults to `null`.
    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: true,
            default: Some(null),
        }
    }

    /// Optional with no default; left absent when not supplied.
    pub const fn system(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: true,
            default: None,
        }
    }
}

/// Validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fill defaults and require every required field.
    Complete,
    /// Check only the fields that are present.
    Partial,
}

/// A field that failed its check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field '{}' {}", self.field, self.reason)
    }
}

impl std::error::Error for SchemaError {}

/// Validate `record` against `fields`, returning the checked (and, in
/// [`Mode::Complete`], defaulted) record.
pub fn validate(
    record: &Map<String, Value>,
    fields: &[FieldSpec],
    mode: Mode,
) -> Result<Map<String, Value>, SchemaError> {
    if let Some(unknown) = record
        .keys()
        .find(|key| !fields.iter().any(|f| f.name == key.as_str()))
    {
        return Err(SchemaError::new(unknown, "is not a known field"));
    }

    let mut out = Map::new();
    for spec in fields {
        match record.get(spec.name) {
            Some(Value::Null) if spec.nullable => {
                out.insert(spec.name.to_string(), Value::Null);
            }
            Some(value) => {
                check_kind(spec, value)?;
                out.insert(spec.name.to_string(), value.clone());
            }
            None if mode == Mode::Partial => {}
            None if spec.required => return Err(SchemaError::new(spec.name, "is required")),
            None => {
                if let Some(default) = spec.default {
                    out.insert(spec.name.to_string(), default());
                }
            }
        }
    }
    Ok(out)
}

fn check_kind(spec: &FieldSpec, value: &Value) -> Result<(), SchemaError> {
    let name = spec.name;
    match spec.kind {
        FieldKind::Text => {
            value
                .as_str()
                .ok_or_else(|| SchemaError::new(name, "must be a string"))?;
        }
        FieldKind::NonEmptyText => {
            let s = value
                .as_str()
                .ok_or_else(|| SchemaError::new(name, "must be a string"))?;
            if s.trim().is_empty() {
                return Err(SchemaError::new(name, "must not be empty"));
            }
        }
        FieldKind::Integer { min } => {
            let n = value
                .as_i64()
                .ok_or_else(|| SchemaError::new(name, "must be an integer"))?;
            if n < min {
                return Err(SchemaError::new(name, format!("must be at least {}", min)));
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                return Err(SchemaError::new(name, "must be a boolean"));
            }
        }
        FieldKind::TextList => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::new(name, "must be an array of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(SchemaError::new(name, "must be an array of strings"));
            }
        }
        FieldKind::OneOf(allowed) => {
            let s = value
                .as_str()
                .ok_or_else(|| SchemaError::new(name, "must be a string"))?;
            if !allowed.contains(&s) {
                return Err(SchemaError::new(
                    name,
                    format!("must be one of {}", allowed.join(", ")),
                ));
            }
        }
        FieldKind::Bytes => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::new(name, "must be an array of bytes"))?;
            let in_range = items
                .iter()
                .all(|b| b.as_u64().map(|n| n <= u8::MAX as u64).unwrap_or(false));
            if !in_range {
                return Err(SchemaError::new(name, "must be an array of bytes"));
            }
        }
        FieldKind::MatchPairs => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::new(name, "must be an array of match pairs"))?;
            for item in items {
                let pair = item
                    .as_object()
                    .ok_or_else(|| SchemaError::new(name, "must contain objects"))?;
                let well_formed = pair.len() == 2
                    && pair.get("left").map(Value::is_string).unwrap_or(false)
                    && pair.get("right").map(Value::is_string).unwrap_or(false);
                if !well_formed {
                    return Err(SchemaError::new(
                        name,
                        "entries must have string 'left' and 'right'",
                    ));
                }
            }
        }
        FieldKind::Timestamp => {
            let s = value
                .as_str()
                .ok_or_else(|| SchemaError::new(name, "must be a timestamp string"))?;
            DateTime::parse_from_rfc3339(s)
                .map_err(|_| SchemaError::new(name, "must be an RFC 3339 timestamp"))?;
        }
    }
    Ok(())
}

fn null() -> Value {
    Value::Null
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn empty_text() -> Value {
    Value::String(String::new())
}

fn falsy() -> Value {
    Value::Bool(false)
}

fn truthy() -> Value {
    Value::Bool(true)
}

fn one_mark() -> Value {
    Value::from(1)
}

fn zero() -> Value {
    Value::from(0)
}

fn medium_difficulty() -> Value {
    Value::String(DifficultyLevel::Medium.as_str().to_string())
}

/// Question payloads carried by pending changes.
pub const QUESTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::system("id", FieldKind::NonEmptyText),
    FieldSpec::required("unitName", FieldKind::OneOf(UnitName::ALL)),
    FieldSpec::system("year", FieldKind::Integer { min: 1900 }),
    FieldSpec::system("serialNumber", FieldKind::Integer { min: 1 }),
    FieldSpec::nullable("syllabusSectionId", FieldKind::Text),
    FieldSpec::required("questionType", FieldKind::OneOf(QuestionType::ALL)),
    FieldSpec::required("questionText", FieldKind::NonEmptyText),
    FieldSpec::optional("answerText", FieldKind::Text, empty_text),
    FieldSpec::optional("answerList", FieldKind::TextList, empty_list),
    FieldSpec::nullable("correctOption", FieldKind::Text),
    FieldSpec::optional("matchPairs", FieldKind::MatchPairs, empty_list),
    FieldSpec::optional("marks", FieldKind::Integer { min: 0 }, one_mark),
    FieldSpec::optional(
        "difficultyLevel",
        FieldKind::OneOf(DifficultyLevel::ALL),
        medium_difficulty,
    ),
    FieldSpec::optional("mandatory", FieldKind::Boolean, falsy),
    FieldSpec::nullable("image", FieldKind::Bytes),
    FieldSpec::optional("isDeleted", FieldKind::Boolean, falsy),
    FieldSpec::optional("isLatestVersion", FieldKind::Boolean, truthy),
    FieldSpec::nullable("previousVersionId", FieldKind::Text),
    FieldSpec::nullable("archivedAt", FieldKind::Timestamp),
    FieldSpec::system("createdAt", FieldKind::Timestamp),
    FieldSpec::system("updatedAt", FieldKind::Timestamp),
    FieldSpec::optional("linkedQuestion", FieldKind::TextList, empty_list),
];

/// Syllabus section create/update payloads.
pub const SYLLABUS_SECTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("unitName", FieldKind::OneOf(UnitName::ALL)),
    FieldSpec::required("name", FieldKind::NonEmptyText),
    FieldSpec::nullable("description", FieldKind::Text),
    FieldSpec::optional("weightage", FieldKind::Integer { min: 0 }, zero),
];

/// Queued link-set instructions.
pub const LINKED_QUESTION_EDIT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("questionId", FieldKind::NonEmptyText),
    FieldSpec::required("linkedQuestionIds", FieldKind::TextList),
];
