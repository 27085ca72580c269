//! Applying pending changes to the question collection.
//!
//! One apply run is one SQLite transaction. Store failures roll the whole run
//! back and leave both queues untouched; entries whose target is missing or
//! whose payload cannot form a question are skipped, logged and drained.

use std::collections::HashMap;

use sqlx::{Row, SqliteConnection};

use super::links::{clear_link_edits, load_link_edits};
use super::pending::{fetch_pending_change, load_pending_changes, remove_pending_change};
use super::repository::{
    bump_revision, encode_json, fetch_question, insert_question, parse_json_array,
    write_question, Repository,
};
use crate::errors::AppError;
use crate::models::{
    AppliedChange, AppliedKind, ApplyReport, PendingChange, Question, SkippedChange, UnitName,
};
use crate::versioning::{
    classify, next_after, plan_change, previously_linked_ids, reconcile_links,
    redirect_to_successors, referenced_ids, ApplyContext, ChangeAction, ChangePlan, DraftQuestion, SerialAllocator,
};

impl Repository {
    /// Apply one named pending change. Link edits stay queued.
    pub async fn apply_pending_change(&self, id: &str) -> Result<ApplyReport, AppError> {
        let ctx = ApplyContext::current();
        let mut tx = self.pool.begin().await?;

        let change = fetch_pending_change(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pending change {} not found", id)))?;

        let mut allocator = SerialAllocator::new();
        let mut report = ApplyReport::default();
        apply_change(&mut tx, &change, &ctx, &mut allocator, &mut report).await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            "Applied pending change {} ({} applied, {} skipped)",
            id,
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Drain the pending-change log and the link-edit queue in one transaction.
    pub async fn apply_all_pending_changes(&self) -> Result<ApplyReport, AppError> {
        let ctx = ApplyContext::current();
        let mut tx = self.pool.begin().await?;

        let changes = load_pending_changes(&mut tx).await?;
        let mut allocator = SerialAllocator::new();
        let mut report = ApplyReport::default();

        for change in &changes {
            apply_change(&mut tx, change, &ctx, &mut allocator, &mut report).await?;
        }

        report.links_updated = reconcile_linked_questions(&mut tx).await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            "Applied {} pending changes ({} skipped), rewrote {} link sets",
            report.applied.len(),
            report.skipped.len(),
            report.links_updated
        );
        Ok(report)
    }

    /// Next serial number for a unit and year, outside any batch.
    pub async fn next_serial_number(&self, unit: UnitName, year: i64) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        next_serial_number_in_tx(&mut conn, unit, year, None).await
    }
}

/// Next serial for `(unit, year)`.
///
/// With `last_assigned` from earlier in the same batch the counter is simply
/// advanced; otherwise the highest stored serial is read from the index.
pub(super) async fn next_serial_number_in_tx(
    conn: &mut SqliteConnection,
    unit: UnitName,
    year: i64,
    last_assigned: Option<i64>,
) -> Result<i64, AppError> {
    if last_assigned.is_some() {
        return Ok(next_after(last_assigned));
    }

    let row = sqlx::query(
        "SELECT serial_number FROM questions WHERE unit_name = ? AND year = ? ORDER BY serial_number DESC LIMIT 1",
    )
    .bind(unit.as_str())
    .bind(year)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(next_after(row.map(|r| r.get("serial_number"))))
}

async fn allocate_serial(
    conn: &mut SqliteConnection,
    allocator: &mut SerialAllocator,
    draft: DraftQuestion,
) -> Result<Question, AppError> {
    let (unit, year) = (draft.unit_name(), draft.year());
    let serial =
        next_serial_number_in_tx(conn, unit, year, allocator.last_assigned(unit, year)).await?;
    allocator.record(unit, year, serial);
    Ok(draft.finish(serial))
}

/// Apply one entry and drain it from the log.
async fn apply_change(
    conn: &mut SqliteConnection,
    change: &PendingChange,
    ctx: &ApplyContext,
    allocator: &mut SerialAllocator,
    report: &mut ApplyReport,
) -> Result<(), AppError> {
    let existing = match classify(change) {
        ChangeAction::Revise(target) | ChangeAction::SoftDelete(target) => {
            fetch_question(conn, &target).await?
        }
        ChangeAction::Create | ChangeAction::Untargeted => None,
    };

    let new_id = uuid::Uuid::new_v4().to_string();
    match plan_change(change, existing.as_ref(), ctx, &new_id) {
        ChangePlan::Create(draft) => {
            let question = allocate_serial(conn, allocator, draft).await?;
            insert_question(conn, &question).await?;
            tracing::debug!(
                "Created question {} ({} {}/{})",
                question.id,
                question.unit_name.as_str(),
                question.year,
                question.serial_number
            );
            report.applied.push(AppliedChange {
                change_id: change.id.clone(),
                kind: AppliedKind::Created,
                question_id: question.id,
                previous_version_id: None,
            });
        }
        ChangePlan::Supersede {
            archived,
            successor,
        } => {
            write_question(conn, &archived).await?;
            let question = allocate_serial(conn, allocator, successor).await?;
            insert_question(conn, &question).await?;
            let mirrored = link_successor_back(conn, &question).await?;
            tracing::debug!(
                "Question {} superseded by {} ({} linked rows updated)",
                archived.id,
                question.id,
                mirrored
            );
            report.applied.push(AppliedChange {
                change_id: change.id.clone(),
                kind: AppliedKind::Superseded,
                question_id: question.id,
                previous_version_id: Some(archived.id),
            });
        }
        ChangePlan::SoftDelete(row) => {
            write_question(conn, &row).await?;
            tracing::debug!("Question {} soft-deleted", row.id);
            report.applied.push(AppliedChange {
                change_id: change.id.clone(),
                kind: AppliedKind::SoftDeleted,
                question_id: row.id,
                previous_version_id: None,
            });
        }
        ChangePlan::Skip(reason) => {
            tracing::warn!("Skipping pending change {}: {}", change.id, reason);
            report.skipped.push(SkippedChange {
                change_id: change.id.clone(),
                reason,
            });
        }
    }

    remove_pending_change(conn, &change.id).await?;
    Ok(())
}

/// Fold the link-edit queue into the question rows and clear it.
/// Returns the number of rows whose link set was rewritten.
async fn reconcile_linked_questions(conn: &mut SqliteConnection) -> Result<usize, AppError> {
    let edits = load_link_edits(conn).await?;
    if edits.is_empty() {
        return Ok(0);
    }

    // Edits queued against a row that has since been revised land on its
    // latest version.
    let successors = load_successors(conn, &referenced_ids(&edits)).await?;
    let edits = redirect_to_successors(edits, &successors);

    let mut current = load_link_sets(conn, &referenced_ids(&edits)).await?;
    let earlier = previously_linked_ids(&edits, &current);
    current.extend(load_link_sets(conn, &earlier).await?);

    let plan = reconcile_links(&edits, &current);
    for unknown in &plan.unknown_ids {
        tracing::warn!("Linked question {} does not exist; link dropped", unknown);
    }

    for update in &plan.updates {
        sqlx::query("UPDATE questions SET linked_question = ? WHERE id = ?")
            .bind(encode_json(&update.linked_question)?)
            .bind(&update.question_id)
            .execute(&mut *conn)
            .await?;
    }

    let cleared = clear_link_edits(conn).await?;
    tracing::debug!("Cleared {} linked question edits", cleared);
    Ok(plan.updates.len())
}

/// Add a new version's id to every row its link set names. Those rows keep
/// the predecessor's id too, so the archived row stays symmetric.
async fn link_successor_back(
    conn: &mut SqliteConnection,
    successor: &Question,
) -> Result<usize, AppError> {
    let sets = load_link_sets(conn, &successor.linked_question).await?;
    let mut updated = 0;
    for (id, mut links) in sets {
        if id == successor.id || links.contains(&successor.id) {
            continue;
        }
        links.push(successor.id.clone());
        sqlx::query("UPDATE questions SET linked_question = ? WHERE id = ?")
            .bind(encode_json(&links)?)
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        updated += 1;
    }
    Ok(updated)
}

/// Map each of `ids` that has been revised to its newest version.
async fn load_successors(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashMap<String, String>, AppError> {
    let mut successors = HashMap::new();
    let mut frontier: Vec<String> = ids.to_vec();
    while let Some(id) = frontier.pop() {
        if successors.contains_key(&id) {
            continue;
        }
        let row = sqlx::query("SELECT id FROM questions WHERE previous_version_id = ? LIMIT 1")
            .bind(&id)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            let next: String = row.get("id");
            frontier.push(next.clone());
            successors.insert(id, next);
        }
    }
    Ok(successors)
}

/// Stored link sets of the given ids; ids without a row are left out.
async fn load_link_sets(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashMap<String, Vec<String>>, AppError> {
    let mut sets = HashMap::with_capacity(ids.len());
    for id in ids {
        let row = sqlx::query("SELECT linked_question FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            let links: String = row.get("linked_question");
            sets.insert(id.clone(), parse_json_array(&links));
        }
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::db::pending::insert_raw_pending_change;
    use crate::models::{ChangeType, CreatePendingChangeRequest, LinkedQuestionsRequest};
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn add_request(unit: &str, text: &str) -> CreatePendingChangeRequest {
        CreatePendingChangeRequest {
            change_type: ChangeType::Add,
            data: json!({
                "unitName": unit,
                "questionType": "shortAnswer",
                "questionText": text,
                "marks": 5
            })
            .as_object()
            .cloned()
            .unwrap(),
        }
    }

    fn update_request(id: &str, fields: serde_json::Value) -> CreatePendingChangeRequest {
        let mut data = fields.as_object().cloned().unwrap();
        data.insert("id".to_string(), json!(id));
        CreatePendingChangeRequest {
            change_type: ChangeType::Update,
            data,
        }
    }

    async fn links(repo: &Repository, id: &str) -> Vec<String> {
        let mut links = repo.get_question(id).await.unwrap().unwrap().linked_question;
        links.sort();
        links
    }

    fn sorted(ids: &[&String]) -> Vec<String> {
        let mut ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        ids.sort();
        ids
    }

    async fn seed(repo: &Repository, texts: &[&str]) -> Vec<String> {
        for text in texts {
            repo.add_pending_change(&add_request("ADC", text)).await.unwrap();
        }
        let report = repo.apply_all_pending_changes().await.unwrap();
        report.applied.into_iter().map(|a| a.question_id).collect()
    }

    #[tokio::test]
    async fn test_missing_delete_target_is_skipped_and_drained() {
        let (repo, _dir) = test_repo().await;

        repo.add_pending_change(&add_request("ADC", "Define QFE."))
            .await
            .unwrap();
        let ghost = PendingChange {
            id: "pc-ghost".to_string(),
            change_type: ChangeType::Delete,
            data: json!({"id": "q2", "isDeleted": true})
                .as_object()
                .cloned()
                .unwrap(),
            created_at: "2000-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2000-01-01T00:00:00.000000Z".to_string(),
        };
        insert_raw_pending_change(&repo, &ghost).await.unwrap();

        let report = repo.apply_all_pending_changes().await.unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].change_id, "pc-ghost");
        assert!(repo.get_question("q2").await.unwrap().is_none());
        assert!(repo.list_pending_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serials_continue_across_batches() {
        let (repo, _dir) = test_repo().await;

        seed(&repo, &["First", "Second"]).await;
        let year = ApplyContext::current().year;
        assert_eq!(
            repo.next_serial_number(UnitName::ADC, year).await.unwrap(),
            3
        );
        assert_eq!(
            repo.next_serial_number(UnitName::APP, year).await.unwrap(),
            1
        );

        seed(&repo, &["Third", "Fourth", "Fifth"]).await;

        let mut serials: Vec<i64> = repo
            .list_questions()
            .await
            .unwrap()
            .iter()
            .map(|q| q.serial_number)
            .collect();
        serials.sort();
        assert_eq!(serials, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_revision_keeps_old_row_and_links_successor() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["Explain wake turbulence."]).await;
        let original = &ids[0];

        repo.add_pending_change(&CreatePendingChangeRequest {
            change_type: ChangeType::Update,
            data: json!({"id": original, "marks": 10, "isDeleted": false})
                .as_object()
                .cloned()
                .unwrap(),
        })
        .await
        .unwrap();
        let report = repo.apply_all_pending_changes().await.unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].kind, AppliedKind::Superseded);
        let successor_id = &report.applied[0].question_id;

        let old = repo.get_question(original).await.unwrap().unwrap();
        assert!(!old.is_latest_version);
        assert!(old.archived_at.is_some());
        assert_eq!(old.marks, 5);

        let successor = repo.get_question(successor_id).await.unwrap().unwrap();
        assert!(successor.is_latest_version);
        assert_eq!(successor.marks, 10);
        assert_eq!(successor.previous_version_id.as_deref(), Some(original.as_str()));
        assert_eq!(successor.question_text, "Explain wake turbulence.");

        let history = repo.question_history(successor_id).await.unwrap();
        let lineage: Vec<&str> = history.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(lineage, vec![successor_id.as_str(), original.as_str()]);
    }

    #[tokio::test]
    async fn test_revising_archived_row_is_skipped() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["Define transition altitude."]).await;
        let original = &ids[0];

        let update = CreatePendingChangeRequest {
            change_type: ChangeType::Update,
            data: json!({"id": original, "marks": 7})
                .as_object()
                .cloned()
                .unwrap(),
        };
        repo.add_pending_change(&update).await.unwrap();
        repo.apply_all_pending_changes().await.unwrap();

        repo.add_pending_change(&update).await.unwrap();
        let report = repo.apply_all_pending_changes().await.unwrap();

        assert!(report.applied.is_empty());
        assert_eq!(report.skipped.len(), 1);
        let latest: Vec<_> = repo
            .list_active_questions()
            .await
            .unwrap()
            .into_iter()
            .filter(|q| q.previous_version_id.as_deref() == Some(original.as_str()))
            .collect();
        assert_eq!(latest.len(), 1);
    }

    #[tokio::test]
    async fn test_single_apply_leaves_link_queue() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["A", "B"]).await;

        repo.add_linked_questions(&LinkedQuestionsRequest {
            question_id: ids[0].clone(),
            linked_question_ids: vec![ids[1].clone()],
        })
        .await
        .unwrap();
        let change = repo
            .delete_question(&ids[1], &Default::default())
            .await
            .unwrap();

        let report = repo.apply_pending_change(&change.id).await.unwrap();

        assert_eq!(report.applied[0].kind, AppliedKind::SoftDeleted);
        assert_eq!(report.links_updated, 0);
        assert_eq!(repo.list_linked_question_edits().await.unwrap().len(), 1);
        assert!(repo.get_question(&ids[1]).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_apply_unknown_change_is_not_found() {
        let (repo, _dir) = test_repo().await;
        let before = repo.get_revision_id().await.unwrap();

        let err = repo.apply_pending_change("missing").await.unwrap_err();

        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(repo.get_revision_id().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_apply_all_bumps_revision_once() {
        let (repo, _dir) = test_repo().await;
        repo.add_pending_change(&add_request("CNS", "One")).await.unwrap();
        repo.add_pending_change(&add_request("CNS", "Two")).await.unwrap();
        let before = repo.get_revision_id().await.unwrap();

        repo.apply_all_pending_changes().await.unwrap();

        assert_eq!(repo.get_revision_id().await.unwrap(), before + 1);
    }

    #[tokio::test]
    async fn test_revised_row_is_linked_from_both_sides() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["Define VMC.", "Define IMC."]).await;
        let (a, b) = (&ids[0], &ids[1]);

        repo.add_linked_questions(&LinkedQuestionsRequest {
            question_id: a.clone(),
            linked_question_ids: vec![b.clone()],
        })
        .await
        .unwrap();
        repo.apply_all_pending_changes().await.unwrap();

        repo.add_pending_change(&update_request(a, json!({"marks": 8})))
            .await
            .unwrap();
        let report = repo.apply_all_pending_changes().await.unwrap();
        let successor = &report.applied[0].question_id;

        assert_eq!(links(&repo, successor).await, vec![b.clone()]);
        assert_eq!(links(&repo, b).await, sorted(&[a, successor]));
        assert_eq!(links(&repo, a).await, vec![b.clone()]);
    }

    #[tokio::test]
    async fn test_link_edit_for_row_revised_in_same_batch_lands_on_successor() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["Define QNH.", "Define QFE.", "Define QNE."]).await;
        let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

        repo.add_pending_change(&update_request(a, json!({"marks": 3})))
            .await
            .unwrap();
        repo.add_linked_questions(&LinkedQuestionsRequest {
            question_id: a.clone(),
            linked_question_ids: vec![c.clone()],
        })
        .await
        .unwrap();
        repo.add_linked_questions(&LinkedQuestionsRequest {
            question_id: b.clone(),
            linked_question_ids: vec![a.clone()],
        })
        .await
        .unwrap();

        let report = repo.apply_all_pending_changes().await.unwrap();
        let successor = &report.applied[0].question_id;

        assert_eq!(links(&repo, successor).await, sorted(&[b, c]));
        assert_eq!(links(&repo, b).await, vec![successor.clone()]);
        assert_eq!(links(&repo, c).await, vec![successor.clone()]);
        assert!(links(&repo, a).await.is_empty());
        assert!(repo.list_linked_question_edits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back_whole_batch() {
        let (repo, _dir) = test_repo().await;
        let ids = seed(&repo, &["Define TORA.", "Define TODA."]).await;

        repo.add_linked_questions(&LinkedQuestionsRequest {
            question_id: ids[0].clone(),
            linked_question_ids: vec![ids[1].clone()],
        })
        .await
        .unwrap();
        repo.add_pending_change(&add_request("ADC", "fine"))
            .await
            .unwrap();
        repo.add_pending_change(&add_request("ADC", "boom"))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON questions
             WHEN NEW.question_text = 'boom'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let pending_before = repo.list_pending_changes().await.unwrap();
        let edits_before = repo.list_linked_question_edits().await.unwrap();
        let revision_before = repo.get_revision_id().await.unwrap();

        let err = repo.apply_all_pending_changes().await.unwrap_err();

        assert_eq!(err.error_code(), "DATABASE_ERROR");
        let pending_after: Vec<String> = repo
            .list_pending_changes()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        let pending_before: Vec<String> = pending_before.into_iter().map(|c| c.id).collect();
        assert_eq!(pending_after, pending_before);
        assert_eq!(
            repo.list_linked_question_edits().await.unwrap().len(),
            edits_before.len()
        );
        assert_eq!(repo.list_questions().await.unwrap().len(), 2);
        assert!(links(&repo, &ids[0]).await.is_empty());
        assert_eq!(repo.get_revision_id().await.unwrap(), revision_before);
    }
}
