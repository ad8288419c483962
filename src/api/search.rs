//! Search API endpoints.

use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::db::Repository;
use crate::models::{Activation, DeliveryView};
use crate::search::{RecordKind, SearchResult, MAX_SEARCH_OFFSET};
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Restrict results to deliveries or activations.
    #[serde(default)]
    pub kind: Option<RecordKind>,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search result with records and metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Hydrated record behind a search hit.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum SearchRecord {
    Delivery(DeliveryView),
    Activation(Activation),
}

/// Single search result item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    #[serde(flatten)]
    pub record: SearchRecord,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Search deliveries and activations.
pub async fn search_records(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let offset = params.offset.min(MAX_SEARCH_OFFSET);

    let hits = match state.search.search(&params.q, params.kind, limit, offset) {
        Ok(hits) => hits,
        Err(e) => return error(e, revision_id),
    };

    let results = hydrate(&state.repo, hits, Utc::now()).await;

    let total = results.len();

    success(
        SearchResponse {
            results,
            total,
            limit,
            offset,
        },
        revision_id,
    )
}

/// Load the records behind search hits. Hits whose record vanished since indexing are skipped.
async fn hydrate(
    repo: &Repository,
    hits: Vec<SearchResult>,
    now: DateTime<Utc>,
) -> Vec<SearchResultItem> {
    let mut results = Vec::new();
    for hit in hits {
        let record = match hit.kind {
            RecordKind::Delivery => repo
                .get_delivery(&hit.record_id)
                .await
                .map(|found| found.map(|delivery| SearchRecord::Delivery(delivery.view(now)))),
            RecordKind::Activation => repo
                .get_activation(&hit.record_id)
                .await
                .map(|found| found.map(SearchRecord::Activation)),
        };
        match record {
            Ok(Some(record)) => results.push(SearchResultItem {
                record,
                score: hit.score,
            }),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(record_id = %hit.record_id, "Failed to load search hit: {}", e);
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateDeliveryRequest;
    use crate::workflow::test_support::{at, TestDesk};

    fn hit(record_id: &str, kind: RecordKind) -> SearchResult {
        SearchResult {
            record_id: record_id.to_string(),
            kind,
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_hydrate_skips_missing_and_unreadable_records() {
        let desk = TestDesk::new().await;
        let delivery = desk
            .deliveries()
            .create(CreateDeliveryRequest {
                title: "Aftermovie".to_string(),
                description: None,
                deadline: at(20),
                format_specs: None,
                responsible_id: None,
                activity_id: None,
                event_id: None,
                priority: 3,
                created_by: None,
            })
            .await
            .unwrap();

        let hits = vec![
            hit(&delivery.id, RecordKind::Delivery),
            hit("gone", RecordKind::Activation),
        ];
        let results = hydrate(&desk.repo, hits.clone(), at(12)).await;
        assert_eq!(results.len(), 1);
        match &results[0].record {
            SearchRecord::Delivery(view) => {
                assert_eq!(view.delivery.id, delivery.id);
                assert!(!view.is_overdue);
            }
            other => panic!("unexpected record {:?}", other),
        }

        desk.repo.pool().close().await;
        assert!(hydrate(&desk.repo, hits, at(12)).await.is_empty());
    }
}
