//! Tantivy-based search index module.
//!
//! Provides full-text search over deliveries and activations with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Activation, Delivery};

const BOOST_TITLE: f32 = 10.0;
const BOOST_DETAILS: f32 = 6.0;
const BOOST_DESCRIPTION: f32 = 5.0;

/// Deepest page a search may ask for. Larger offsets return no hits.
pub const MAX_SEARCH_OFFSET: usize = 10_000;

/// Record type stored alongside each document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Delivery,
    Activation,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Delivery => "delivery",
            RecordKind::Activation => "activation",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "delivery" => Some(RecordKind::Delivery),
            "activation" => Some(RecordKind::Activation),
            _ => None,
        }
    }
}

/// Search hit with record reference and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record_id: String,
    pub kind: RecordKind,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    record_id: Field,
    kind: Field,
    title: Field,
    description: Field,
    /// Format specs for deliveries, location for activations
    details: Field,
}

/// Tantivy search index for production records.
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
        let record_id = schema_builder.add_text_field("record_id", STRING | STORED);
        let kind = schema_builder.add_text_field("kind", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let description = schema_builder.add_text_field("description", TEXT);
        let details = schema_builder.add_text_field("details", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            record_id,
            kind,
            title,
            description,
            details,
        };

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

    /// Rebuild the entire index from the database contents.
    pub async fn rebuild(
        &self,
        deliveries: &[Delivery],
        activations: &[Activation],
    ) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_all_documents()?;

        for delivery in deliveries {
            writer.add_document(self.delivery_document(delivery))?;
        }
        for activation in activations {
            writer.add_document(self.activation_document(activation))?;
        }

        writer.commit()?;
        self.reader.reload()?;

        tracing::info!(
            "Search index rebuilt with {} deliveries and {} activations",
            deliveries.len(),
            activations.len()
        );
        Ok(())
    }

    pub async fn index_delivery(&self, delivery: &Delivery) -> Result<(), AppError> {
        self.replace(&delivery.id, self.delivery_document(delivery))
            .await
    }

    pub async fn index_activation(&self, activation: &Activation) -> Result<(), AppError> {
        self.replace(&activation.id, self.activation_document(activation))
            .await
    }

    /// Remove a record from the index.
    pub async fn remove(&self, record_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_term(Term::from_field_text(self.fields.record_id, record_id));
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Search records, optionally restricted to one kind.
    pub fn search(
        &self,
        query_str: &str,
        kind: Option<RecordKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 || offset > MAX_SEARCH_OFFSET {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.title, self.fields.description, self.fields.details],
        );
        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.details, BOOST_DETAILS),
            (self.fields.description, BOOST_DESCRIPTION),
        ];
        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        let text_query: Box<dyn Query> = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let combined_query: Box<dyn Query> = match kind {
            Some(kind) => {
                let kind_query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.kind, kind.as_str()),
                    IndexRecordOption::Basic,
                ));
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (Occur::Must, kind_query),
                ]))
            }
            None => text_query,
        };

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(limit.saturating_add(offset)))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let record_id = doc.get_first(self.fields.record_id)?.as_str()?.to_string();
                let kind = RecordKind::parse(doc.get_first(self.fields.kind)?.as_str()?)?;
                Some(SearchResult {
                    record_id,
                    kind,
                    score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn replace(&self, record_id: &str, document: TantivyDocument) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_term(Term::from_field_text(self.fields.record_id, record_id));
        writer.add_document(document)?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn delivery_document(&self, delivery: &Delivery) -> TantivyDocument {
        doc!(
            self.fields.record_id => delivery.id.clone(),
            self.fields.kind => RecordKind::Delivery.as_str().to_string(),
            self.fields.title => delivery.title.clone(),
            self.fields.description => delivery.description.clone().unwrap_or_default(),
            self.fields.details => delivery.format_specs.clone().unwrap_or_default()
        )
    }

    fn activation_document(&self, activation: &Activation) -> TantivyDocument {
        doc!(
            self.fields.record_id => activation.id.clone(),
            self.fields.kind => RecordKind::Activation.as_str().to_string(),
            self.fields.title => activation.name.clone(),
            self.fields.description => activation.description.clone().unwrap_or_default(),
            self.fields.details => activation.location.clone().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivationStatus, DeliveryStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn delivery(id: &str, title: &str, specs: &str) -> Delivery {
        let now = Utc::now();
        Delivery {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            deadline: now,
            format_specs: Some(specs.to_string()),
            responsible_id: None,
            activity_id: None,
            event_id: None,
            priority: 3,
            status: DeliveryStatus::Pending,
            progress: 0.0,
            created_by: None,
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    fn activation(id: &str, name: &str, location: &str) -> Activation {
        let now = Utc::now();
        Activation {
            id: id.to_string(),
            sponsor_id: "sponsor".to_string(),
            event_id: None,
            activity_id: None,
            name: name.to_string(),
            description: None,
            location: Some(location.to_string()),
            status: ActivationStatus::Pending,
            scheduled_date: now,
            priority: 2,
            responsible_id: None,
            approved_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_search_across_kinds() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .rebuild(
                &[
                    delivery("d1", "Backstage interview", "vertical 9:16"),
                    delivery("d2", "Aftermovie", "4K landscape"),
                ],
                &[activation("a1", "Backstage lounge", "Hall B")],
            )
            .await
            .unwrap();

        let results = index.search("backstage", None, 10, 0).unwrap();
        assert_eq!(results.len(), 2);

        let only_activations = index
            .search("backstage", Some(RecordKind::Activation), 10, 0)
            .unwrap();
        assert_eq!(only_activations.len(), 1);
        assert_eq!(only_activations[0].record_id, "a1");

        let by_specs = index.search("landscape", None, 10, 0).unwrap();
        assert_eq!(by_specs[0].record_id, "d2");
        assert_eq!(by_specs[0].kind, RecordKind::Delivery);
    }

    #[tokio::test]
    async fn test_reindex_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .index_delivery(&delivery("d1", "Opening ceremony", "1080p"))
            .await
            .unwrap();
        index
            .index_delivery(&delivery("d1", "Closing ceremony", "1080p"))
            .await
            .unwrap();
        assert!(index.search("opening", None, 10, 0).unwrap().is_empty());
        assert_eq!(index.search("closing", None, 10, 0).unwrap().len(), 1);

        index.remove("d1").await.unwrap();
        assert!(index.search("closing", None, 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let results = index.search("", None, 10, 0).unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_window_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();
        index
            .index_delivery(&delivery("d1", "Opening ceremony", "1080p"))
            .await
            .unwrap();

        assert!(index.search("opening", None, 0, 0).unwrap().is_empty());
        assert!(index.search("opening", None, 10, 1).unwrap().is_empty());
        assert!(index
            .search("opening", None, 10, MAX_SEARCH_OFFSET)
            .unwrap()
            .is_empty());
        assert!(index.search("opening", None, 10, usize::MAX).unwrap().is_empty());
        assert_eq!(index.search("opening", None, 10, 0).unwrap().len(), 1);
    }
}
