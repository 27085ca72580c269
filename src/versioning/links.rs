use std::collections::{HashMap, HashSet};

use crate::models::LinkedQuestionEdit;

/// New `linkedQuestion` value for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUpdate {
    pub question_id: String,
    pub linked_question: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub updates: Vec<LinkUpdate>,
    /// Referenced ids with no question row; dropped from every link set.
    pub unknown_ids: Vec<String>,
}

/// Ids whose stored link sets the reconciler needs: every edited question and
/// every id it links to. Rows an edited question used to link to are found
/// from the first round of lookups, see [`previously_linked_ids`].
pub fn referenced_ids(edits: &[LinkedQuestionEdit]) -> Vec<String> {
    let mut ids = Vec::new();
    for edit in edits {
        push_unique(&mut ids, &edit.question_id);
        for target in &edit.linked_question_ids {
            push_unique(&mut ids, target);
        }
    }
    ids
}

/// Ids currently linked from edited questions that are not in `current` yet.
pub fn previously_linked_ids(
    edits: &[LinkedQuestionEdit],
    current: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut ids = Vec::new();
    for edit in edits {
        if let Some(links) = current.get(&edit.question_id) {
            for id in links {
                if !current.contains_key(id) {
                    push_unique(&mut ids, id);
                }
            }
        }
    }
    ids
}

/// Fold the queued edits into symmetric link sets.
///
/// `current` maps every existing question id involved to its stored link set.
/// An edited question's set is replaced by its edit (the last edit per question
/// wins) plus any question that links to it within the same batch. Every other
/// touched row keeps its stored set, gains the reverse links pointing at it,
/// and loses links from edited questions that dropped it.
pub fn reconcile_links(
    edits: &[LinkedQuestionEdit],
    current: &HashMap<String, Vec<String>>,
) -> LinkPlan {
    let mut unknown_ids = Vec::new();

    // Explicit sets, in first-seen order.
    let mut explicit: Vec<(String, Vec<String>)> = Vec::new();
    for edit in edits {
        if !current.contains_key(&edit.question_id) {
            push_unique(&mut unknown_ids, &edit.question_id);
            continue;
        }
        let mut desired = Vec::new();
        for target in &edit.linked_question_ids {
            if target == &edit.question_id {
                continue;
            }
            if !current.contains_key(target) {
                push_unique(&mut unknown_ids, target);
                continue;
            }
            push_unique(&mut desired, target);
        }
        match explicit.iter_mut().find(|(id, _)| id == &edit.question_id) {
            Some(entry) => entry.1 = desired,
            None => explicit.push((edit.question_id.clone(), desired)),
        }
    }
    let explicit_ids: HashSet<&str> = explicit.iter().map(|(id, _)| id.as_str()).collect();

    let mut touched: Vec<String> = Vec::new();
    let mut added: HashMap<String, Vec<String>> = HashMap::new();
    let mut removed: HashMap<String, Vec<String>> = HashMap::new();

    for (source, desired) in &explicit {
        for target in desired {
            push_unique(added.entry(target.clone()).or_default(), source);
            if !explicit_ids.contains(target.as_str()) {
                push_unique(&mut touched, target);
            }
        }
        let previous = current.get(source).map(Vec::as_slice).unwrap_or_default();
        for target in previous {
            let dropped = !desired.contains(target) && target != source;
            if dropped && current.contains_key(target) && !explicit_ids.contains(target.as_str())
            {
                push_unique(removed.entry(target.clone()).or_default(), source);
                push_unique(&mut touched, target);
            }
        }
    }

    let mut updates = Vec::with_capacity(explicit.len() + touched.len());
    for (source, desired) in explicit {
        let mut links = desired;
        for back in added.get(&source).into_iter().flatten() {
            push_unique(&mut links, back);
        }
        updates.push(LinkUpdate {
            question_id: source,
            linked_question: links,
        });
    }
    for target in touched {
        let dropped = removed.get(&target);
        let mut links: Vec<String> = current
            .get(&target)
            .into_iter()
            .flatten()
            .filter(|id| !dropped.map(|d| d.contains(*id)).unwrap_or(false))
            .cloned()
            .collect();
        for back in added.get(&target).into_iter().flatten() {
            push_unique(&mut links, back);
        }
        updates.push(LinkUpdate {
            question_id: target,
            linked_question: links,
        });
    }

    LinkPlan {
        updates,
        unknown_ids,
    }
}

/// Point queued edits at the rows that replaced their ids earlier in the same
/// batch. `successors` maps an archived id to the id of its successor.
pub fn redirect_to_successors(
    edits: Vec<LinkedQuestionEdit>,
    successors: &HashMap<String, String>,
) -> Vec<LinkedQuestionEdit> {
    if successors.is_empty() {
        return edits;
    }
    edits
        .into_iter()
        .map(|mut edit| {
            edit.question_id = latest_id(&edit.question_id, successors);
            edit.linked_question_ids = edit
                .linked_question_ids
                .iter()
                .map(|id| latest_id(id, successors))
                .collect();
            edit
        })
        .collect()
}

fn latest_id(id: &str, successors: &HashMap<String, String>) -> String {
    let mut current = id;
    // Bounded so a cyclic map cannot spin.
    for _ in 0..successors.len() {
        match successors.get(current) {
            Some(next) => current = next,
            None => break,
        }
    }
    current.to_string()
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}
