use serde_json::{Map, Value};

use super::ApplyContext;
use crate::models::{ChangeType, PendingChange, Question, UnitName};
use crate::schema::{self, Mode, QUESTION_FIELDS};

/// Branch a pending change takes when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Revise(String),
    SoftDelete(String),
    /// Update or delete without a target id.
    Untargeted,
}

pub fn classify(change: &PendingChange) -> ChangeAction {
    match (change.change_type, change.target_id()) {
        (ChangeType::Add, _) => ChangeAction::Create,
        (_, None) => ChangeAction::Untargeted,
        (ChangeType::Delete, Some(id)) => ChangeAction::SoftDelete(id.to_string()),
        (ChangeType::Update, Some(id)) if change.marks_deleted() => {
            ChangeAction::SoftDelete(id.to_string())
        }
        (ChangeType::Update, Some(id)) => ChangeAction::Revise(id.to_string()),
    }
}

/// A new row that still needs its serial number.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftQuestion(Question);

impl DraftQuestion {
    pub fn unit_name(&self) -> UnitName {
        self.0.unit_name
    }

    pub fn year(&self) -> i64 {
        self.0.year
    }

    pub fn finish(mut self, serial_number: i64) -> Question {
        self.0.serial_number = serial_number;
        self.0
    }
}

/// Writes one pending change turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePlan {
    Create(DraftQuestion),
    /// Archive `archived` in place and insert `successor`.
    Supersede {
        archived: Question,
        successor: DraftQuestion,
    },
    SoftDelete(Question),
    /// Nothing is written; the entry is still drained.
    Skip(String),
}

/// Decide what applying `change` does given the row it targets.
///
/// `existing` is the row named by the change's target id, if any, and
/// `new_id` the id a created or superseding row receives.
pub fn plan_change(
    change: &PendingChange,
    existing: Option<&Question>,
    ctx: &ApplyContext,
    new_id: &str,
) -> ChangePlan {
    match classify(change) {
        ChangeAction::Create => plan_create(&change.data, ctx, new_id),
        ChangeAction::Revise(target) => match existing {
            Some(row) if row.is_latest_version => plan_revision(row, &change.data, ctx, new_id),
            Some(_) => ChangePlan::Skip(format!("Question {} is an archived version", target)),
            None => ChangePlan::Skip(format!("Question {} not found", target)),
        },
        ChangeAction::SoftDelete(target) => match existing {
            Some(row) => {
                let mut row = row.clone();
                row.is_deleted = true;
                row.updated_at = ctx.now.clone();
                ChangePlan::SoftDelete(row)
            }
            None => ChangePlan::Skip(format!("Question {} not found", target)),
        },
        ChangeAction::Untargeted => {
            ChangePlan::Skip("Pending change has no target question id".to_string())
        }
    }
}

fn plan_create(data: &Map<String, Value>, ctx: &ApplyContext, new_id: &str) -> ChangePlan {
    let mut record = match schema::validate(data, QUESTION_FIELDS, Mode::Complete) {
        Ok(record) => record,
        Err(err) => return ChangePlan::Skip(format!("Invalid question payload: {}", err)),
    };

    stamp_new_row(&mut record, ctx, new_id);
    record.insert("createdAt".into(), Value::String(ctx.now.clone()));
    record.insert("previousVersionId".into(), Value::Null);

    match serde_json::from_value::<Question>(Value::Object(record)) {
        Ok(question) => ChangePlan::Create(DraftQuestion(question)),
        Err(err) => ChangePlan::Skip(format!("Invalid question payload: {}", err)),
    }
}

fn plan_revision(
    existing: &Question,
    data: &Map<String, Value>,
    ctx: &ApplyContext,
    new_id: &str,
) -> ChangePlan {
    let mut merged = match serde_json::to_value(existing) {
        Ok(Value::Object(map)) => map,
        _ => return ChangePlan::Skip(format!("Question {} could not be read", existing.id)),
    };
    for (key, value) in data {
        merged.insert(key.clone(), value.clone());
    }

    stamp_new_row(&mut merged, ctx, new_id);
    merged.insert(
        "previousVersionId".into(),
        Value::String(existing.id.clone()),
    );

    let successor = match serde_json::from_value::<Question>(Value::Object(merged)) {
        Ok(question) => question,
        Err(err) => return ChangePlan::Skip(format!("Invalid question payload: {}", err)),
    };

    let mut archived = existing.clone();
    archived.is_latest_version = false;
    archived.archived_at = Some(ctx.now.clone());

    ChangePlan::Supersede {
        archived,
        successor: DraftQuestion(successor),
    }
}

/// Fields every freshly materialized row gets regardless of its payload.
fn stamp_new_row(record: &mut Map<String, Value>, ctx: &ApplyContext, new_id: &str) {
    record.insert("id".into(), Value::String(new_id.to_string()));
    record.insert("year".into(), Value::from(ctx.year));
    record.insert("serialNumber".into(), Value::from(0));
    record.insert("updatedAt".into(), Value::String(ctx.now.clone()));
    record.insert("isDeleted".into(), Value::Bool(false));
    record.insert("isLatestVersion".into(), Value::Bool(true));
    record.insert("archivedAt".into(), Value::Null);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, QuestionType};
    use serde_json::json;

    fn ctx() -> ApplyContext {
        ApplyContext {
            now: "2026-03-01T10:00:00.000000Z".to_string(),
            year: 2026,
        }
    }

    fn change(change_type: ChangeType, data: Value) -> PendingChange {
        PendingChange {
            id: "pc-1".to_string(),
            change_type,
            data: data.as_object().cloned().unwrap(),
            created_at: "2026-02-01T00:00:00.000000Z".to_string(),
            updated_at: "2026-02-01T00:00:00.000000Z".to_string(),
        }
    }

    fn question(id: &str, marks: i64) -> Question {
        Question {
            id: id.to_string(),
            unit_name: UnitName::ADC,
            year: 2025,
            serial_number: 4,
            syllabus_section_id: Some("sec-1".to_string()),
            question_type: QuestionType::ShortAnswer,
            question_text: "Define runway incursion.".to_string(),
            answer_text: "Any occurrence at an aerodrome...".to_string(),
            answer_list: vec![],
            correct_option: None,
            match_pairs: vec![],
            marks,
            difficulty_level: DifficultyLevel::Medium,
            mandatory: false,
            image: None,
            is_deleted: false,
            is_latest_version: true,
            previous_version_id: None,
            archived_at: None,
            created_at: "2025-05-01T00:00:00.000000Z".to_string(),
            updated_at: "2025-05-01T00:00:00.000000Z".to_string(),
            linked_question: vec!["q9".to_string()],
        }
    }

    #[test]
    fn test_classify_branches() {
        let add = change(ChangeType::Add, json!({ "unitName": "ADC" }));
        assert_eq!(classify(&add), ChangeAction::Create);

        let edit = change(ChangeType::Update, json!({ "id": "q1", "isDeleted": false }));
        assert_eq!(classify(&edit), ChangeAction::Revise("q1".into()));

        let edit_implicit = change(ChangeType::Update, json!({ "id": "q1" }));
        assert_eq!(classify(&edit_implicit), ChangeAction::Revise("q1".into()));

        let flagged = change(ChangeType::Update, json!({ "id": "q1", "isDeleted": true }));
        assert_eq!(classify(&flagged), ChangeAction::SoftDelete("q1".into()));

        let delete = change(ChangeType::Delete, json!({ "id": "q2" }));
        assert_eq!(classify(&delete), ChangeAction::SoftDelete("q2".into()));

        let untargeted = change(ChangeType::Delete, json!({}));
        assert_eq!(classify(&untargeted), ChangeAction::Untargeted);
    }

    #[test]
    fn test_create_stamps_system_fields() {
        let add = change(
            ChangeType::Add,
            json!({
                "unitName": "ADC",
                "questionType": "mcq",
                "questionText": "Which runway is in use?",
                "answerList": ["09", "27"],
                "correctOption": "09",
                "isLatestVersion": false,
                "previousVersionId": "stale"
            }),
        );

        let ChangePlan::Create(draft) = plan_change(&add, None, &ctx(), "new-1") else {
            panic!("expected a create plan");
        };
        assert_eq!(draft.unit_name(), UnitName::ADC);
        assert_eq!(draft.year(), 2026);

        let row = draft.finish(1);
        assert_eq!(row.id, "new-1");
        assert_eq!(row.serial_number, 1);
        assert_eq!(row.marks, 1);
        assert!(row.is_latest_version);
        assert!(!row.is_deleted);
        assert_eq!(row.previous_version_id, None);
        assert_eq!(row.created_at, ctx().now);
        assert_eq!(row.updated_at, ctx().now);
        assert_eq!(row.answer_list, vec!["09", "27"]);
    }

    #[test]
    fn test_create_with_invalid_payload_is_skipped() {
        let add = change(ChangeType::Add, json!({ "unitName": "ADC" }));
        let plan = plan_change(&add, None, &ctx(), "new-1");
        assert!(matches!(plan, ChangePlan::Skip(reason) if reason.contains("questionText")));
    }

    #[test]
    fn test_revision_archives_old_row_and_merges_payload() {
        let existing = question("q1", 5);
        let edit = change(
            ChangeType::Update,
            json!({ "id": "q1", "marks": 10, "isDeleted": false }),
        );

        let ChangePlan::Supersede {
            archived,
            successor,
        } = plan_change(&edit, Some(&existing), &ctx(), "q1-v2")
        else {
            panic!("expected a supersede plan");
        };

        // old row: only the lifecycle flags move
        assert_eq!(archived.id, "q1");
        assert_eq!(archived.marks, 5);
        assert!(!archived.is_latest_version);
        assert_eq!(archived.archived_at.as_deref(), Some(ctx().now.as_str()));
        assert_eq!(archived.updated_at, existing.updated_at);
        assert_eq!(archived.question_text, existing.question_text);

        let successor = successor.finish(5);
        assert_eq!(successor.id, "q1-v2");
        assert_eq!(successor.marks, 10);
        assert_eq!(successor.previous_version_id.as_deref(), Some("q1"));
        assert!(successor.is_latest_version);
        assert_eq!(successor.archived_at, None);
        assert_eq!(successor.year, 2026);
        assert_eq!(successor.question_text, existing.question_text);
        assert_eq!(successor.linked_question, existing.linked_question);
        assert_eq!(successor.updated_at, ctx().now);
    }

    #[test]
    fn test_revision_of_missing_or_archived_row_is_skipped() {
        let edit = change(ChangeType::Update, json!({ "id": "q1", "marks": 10 }));
        assert_eq!(
            plan_change(&edit, None, &ctx(), "x"),
            ChangePlan::Skip("Question q1 not found".to_string())
        );

        let mut archived = question("q1", 5);
        archived.is_latest_version = false;
        assert!(matches!(
            plan_change(&edit, Some(&archived), &ctx(), "x"),
            ChangePlan::Skip(_)
        ));
    }

    #[test]
    fn test_revision_with_mistyped_merge_is_skipped() {
        let existing = question("q1", 5);
        let edit = change(ChangeType::Update, json!({ "id": "q1", "marks": "ten" }));
        assert!(matches!(
            plan_change(&edit, Some(&existing), &ctx(), "x"),
            ChangePlan::Skip(_)
        ));
    }

    #[test]
    fn test_soft_delete_only_flips_flag() {
        let existing = question("q2", 5);
        let delete = change(ChangeType::Delete, json!({ "id": "q2", "isDeleted": true }));

        let ChangePlan::SoftDelete(row) = plan_change(&delete, Some(&existing), &ctx(), "x")
        else {
            panic!("expected a soft delete plan");
        };
        assert_eq!(row.id, "q2");
        assert!(row.is_deleted);
        assert!(row.is_latest_version);
        assert_eq!(row.updated_at, ctx().now);
        assert_eq!(row.marks, 5);
    }

    #[test]
    fn test_soft_delete_of_missing_row_is_skipped() {
        let delete = change(ChangeType::Delete, json!({ "id": "q2" }));
        assert_eq!(
            plan_change(&delete, None, &ctx(), "x"),
            ChangePlan::Skip("Question q2 not found".to_string())
        );
    }
}
