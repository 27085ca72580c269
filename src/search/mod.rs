//! Tantivy-based search index module.
//!
//! Full-text search over the active questions of the bank with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Question, UnitName};

/// Field boost values.
const BOOST_QUESTION_TEXT: f32 = 10.0;
const BOOST_OPTIONS: f32 = 6.0;
const BOOST_ANSWER_TEXT: f32 = 4.0;
const BOOST_UNIT: f32 = 2.0;

/// Search result with question id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub question_id: String,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    question_id: Field,
    question_text: Field,
    answer_text: Field,
    options: Field,
    unit: Field,
}

/// Tantivy search index for questions.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let question_id = schema_builder.add_text_field("question_id", STRING | STORED);
        let question_text = schema_builder.add_text_field("question_text", TEXT);
        let answer_text = schema_builder.add_text_field("answer_text", TEXT);
        let options = schema_builder.add_text_field("options", TEXT);
        let unit = schema_builder.add_text_field("unit", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            question_id,
            question_text,
            answer_text,
            options,
            unit,
        };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index. Deleted and archived rows are left out.
    pub async fn rebuild(&self, questions: &[Question]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;

        let mut indexed = 0;
        for question in questions.iter().filter(|q| q.is_active()) {
            writer.add_document(self.create_document(question))?;
            indexed += 1;
        }

        writer.commit()?;

        // Reload reader to see new documents
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} questions", indexed);
        Ok(())
    }

    /// Search for questions matching the query, optionally within one unit.
    pub fn search(
        &self,
        query_str: &str,
        unit: Option<UnitName>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.question_text,
                self.fields.answer_text,
                self.fields.options,
                self.fields.unit,
            ],
        );

        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();

        let field_queries = [
            (self.fields.question_text, BOOST_QUESTION_TEXT),
            (self.fields.options, BOOST_OPTIONS),
            (self.fields.answer_text, BOOST_ANSWER_TEXT),
            (self.fields.unit, BOOST_UNIT),
        ];

        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                let boosted = BoostQuery::new(field_query, boost);
                subqueries.push((Occur::Should, Box::new(boosted)));
            }
        }

        let mut combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        if let Some(unit) = unit {
            // The unit field is tokenized, so its terms are lowercase
            let term = Term::from_field_text(self.fields.unit, &unit.as_str().to_lowercase());
            let unit_query = TermQuery::new(term, IndexRecordOption::Basic);
            combined_query = Box::new(BooleanQuery::new(vec![
                (Occur::Must, combined_query),
                (Occur::Must, Box::new(unit_query)),
            ]));
        }

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let question_id = doc
                    .get_first(self.fields.question_id)?
                    .as_str()?
                    .to_string();
                Some(SearchResult { question_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, question: &Question) -> TantivyDocument {
        let mut options = question.answer_list.join(" ");
        for pair in &question.match_pairs {
            options.push(' ');
            options.push_str(&pair.left);
            options.push(' ');
            options.push_str(&pair.right);
        }

        doc!(
            self.fields.question_id => question.id.clone(),
            self.fields.question_text => question.question_text.clone(),
            self.fields.answer_text => question.answer_text.clone(),
            self.fields.options => options,
            self.fields.unit => question.unit_name.as_str().to_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, QuestionType, UnitName};
    use tempfile::TempDir;

    fn create_test_question(id: &str, text: &str, answer: &str) -> Question {
        Question {
            id: id.to_string(),
            unit_name: UnitName::ADC,
            year: 2026,
            serial_number: 1,
            syllabus_section_id: None,
            question_type: QuestionType::ShortAnswer,
            question_text: text.to_string(),
            answer_text: answer.to_string(),
            answer_list: vec![],
            correct_option: None,
            match_pairs: vec![],
            marks: 2,
            difficulty_level: DifficultyLevel::Easy,
            mandatory: false,
            image: None,
            is_deleted: false,
            is_latest_version: true,
            previous_version_id: None,
            archived_at: None,
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000000Z".to_string(),
            linked_question: vec![],
        }
    }

    #[tokio::test]
    async fn test_search_index_creation() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let questions = vec![
            create_test_question("1", "Explain wake turbulence separation", "Minimum spacing"),
            create_test_question("2", "Define QNH", "Altimeter setting"),
        ];

        index.rebuild(&questions).await.unwrap();

        let results = index.search("turbulence", None, 10, 0).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].question_id, "1");
    }

    #[tokio::test]
    async fn test_search_skips_inactive_rows() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let mut archived = create_test_question("old", "Holding pattern entry", "");
        archived.is_latest_version = false;
        let mut deleted = create_test_question("gone", "Holding fuel", "");
        deleted.is_deleted = true;
        let live = create_test_question("live", "Holding speed limits", "");

        index.rebuild(&[archived, deleted, live]).await.unwrap();

        let results = index.search("holding", None, 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].question_id, "live");
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let results = index.search("", None, 10, 0).unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_within_unit() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let tower = create_test_question("adc", "Runway visual range reporting", "");
        let mut approach = create_test_question("app", "Runway change on approach", "");
        approach.unit_name = UnitName::APP;

        index.rebuild(&[tower, approach]).await.unwrap();

        assert_eq!(index.search("runway", None, 10, 0).unwrap().len(), 2);
        let results = index.search("runway", Some(UnitName::APP), 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].question_id, "app");
        assert!(index
            .search("runway", Some(UnitName::CNS), 10, 0)
            .unwrap()
            .is_empty());
    }
}
