//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::models::{Question, QuestionType, UnitName};
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: String,
    /// Restrict hits to one unit.
    #[serde(default)]
    pub unit_name: Option<UnitName>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// A matching question, identified the way reviewers cite it:
/// unit, year and serial.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub unit_name: UnitName,
    pub year: i64,
    pub serial_number: i64,
    pub question_type: QuestionType,
    pub question_text: String,
    pub marks: i64,
    pub score: f32,
}

impl SearchHit {
    fn new(question: Question, score: f32) -> Self {
        Self {
            id: question.id,
            unit_name: question.unit_name,
            year: question.year,
            serial_number: question.serial_number,
            question_type: question.question_type,
            question_text: question.question_text,
            marks: question.marks,
            score,
        }
    }
}

const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Search the latest, non-deleted questions.
pub async fn search_questions(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let limit = params.limit.min(MAX_SEARCH_LIMIT);

    let matches = match state
        .search
        .search(&params.q, params.unit_name, limit, params.offset)
    {
        Ok(matches) => matches,
        Err(e) => return error(e, revision_id),
    };

    // The index lags the store until the next rebuild
    let mut hits = Vec::with_capacity(matches.len());
    for m in matches {
        match state.repo.get_question(&m.question_id).await {
            Ok(Some(question)) if question.is_active() => hits.push(SearchHit::new(question, m.score)),
            Ok(_) => {}
            Err(e) => return error(e, revision_id),
        }
    }

    let total = hits.len();
    success(
        SearchResponse {
            hits,
            total,
            limit,
            offset: params.offset,
        },
        revision_id,
    )
}
