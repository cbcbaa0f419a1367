//! Newest-first list reads.
//!
//! A managed document store refuses `where + orderBy` queries that have no
//! matching composite index. `ListQuery` first runs the [`PreferredQuery`]
//! (filter, order and limit server-side) and, only when that fails with
//! [`StoreError::IndexUnavailable`], the [`FallbackQuery`] (filter server-side,
//! order and limit in memory). Callers cannot tell which path ran.

use async_trait::async_trait;

use super::{Collection, Document, EntityStore, Filter, OrderBy, StoreError};
use crate::models::Timestamp;

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait QueryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, store: &dyn EntityStore, query: &ListQuery) -> Result<Vec<Document>, StoreError>;
}

pub struct PreferredQuery;

pub struct FallbackQuery;

#[async_trait]
impl QueryStrategy for PreferredQuery {
    fn name(&self) -> &'static str {
        "preferred"
    }

    async fn run(&self, store: &dyn EntityStore, query: &ListQuery) -> Result<Vec<Document>, StoreError> {
        store
            .query(
                query.collection,
                &query.filters,
                Some(&OrderBy::newest_first()),
                query.limit,
            )
            .await
    }
}

#[async_trait]
impl QueryStrategy for FallbackQuery {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn run(&self, store: &dyn EntityStore, query: &ListQuery) -> Result<Vec<Document>, StoreError> {
        let docs = store
            .query(query.collection, &query.filters, None, None)
            .await?;
        Ok(newest_first(docs, query.limit))
    }
}

/// Sorts by `createdAt` descending, coercing each timestamp once.
pub fn newest_first(docs: Vec<Document>, limit: Option<usize>) -> Vec<Document> {
    let mut keyed: Vec<(Timestamp, Document)> = docs
        .into_iter()
        .map(|doc| (Timestamp::from_value(doc.data.get("createdAt")), doc))
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    let mut sorted: Vec<Document> = keyed.into_iter().map(|(_, doc)| doc).collect();
    if let Some(limit) = limit {
        sorted.truncate(limit);
    }
    sorted
}

impl ListQuery {
    pub fn new(collection: Collection, filters: Vec<Filter>) -> Self {
        Self {
            collection,
            filters,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub async fn execute(&self, store: &dyn EntityStore) -> Result<Vec<Document>, StoreError> {
        match PreferredQuery.run(store, self).await {
            Err(StoreError::IndexUnavailable(index)) => {
                tracing::debug!(
                    collection = %self.collection,
                    index = %index,
                    strategy = FallbackQuery.name(),
                    "composite index missing, sorting client-side"
                );
                FallbackQuery.run(store, self).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{IndexSet, MemoryStore};
    use serde_json::json;

    fn doc(id: &str, created_at: serde_json::Value) -> Document {
        Document {
            id: id.to_string(),
            data: json!({ "createdAt": created_at }),
        }
    }

    #[test]
    fn test_mixed_encodings_sort_like_epoch_millis() {
        let docs = vec![
            doc("millis", json!(1700000000000i64)),
            doc("iso", json!("2023-11-14T10:00:00Z")),
            doc("structured", json!({"seconds": 1700000000, "nanoseconds": 0})),
            doc("later", json!(1700000000001i64)),
            doc("garbage", json!("not a date")),
        ];

        let canonical = {
            let mut keyed: Vec<(i64, String)> = docs
                .iter()
                .map(|d| (Timestamp::from_value(d.data.get("createdAt")).millis(), d.id.clone()))
                .collect();
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
            keyed.into_iter().map(|(_, id)| id).collect::<Vec<_>>()
        };

        let sorted: Vec<String> = newest_first(docs, None).into_iter().map(|d| d.id).collect();
        assert_eq!(sorted, canonical);
        assert_eq!(sorted.first().map(String::as_str), Some("later"));
        assert_eq!(sorted[3], "iso");
        assert_eq!(sorted.last().map(String::as_str), Some("garbage"));
    }

    #[test]
    fn test_limit_applies_after_sort() {
        let docs = vec![doc("a", json!(1)), doc("b", json!(3)), doc("c", json!(2))];
        let ids: Vec<String> = newest_first(docs, Some(2)).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_paths_agree() {
        let indexed = MemoryStore::new(IndexSet::new().with(Collection::Bookings, &["status"], "createdAt"));
        let bare = MemoryStore::new(IndexSet::new());
        for store in [&indexed, &bare] {
            store.seed(Collection::Bookings, "a", json!({"status": "pending", "createdAt": 100}));
            store.seed(Collection::Bookings, "b", json!({"status": "pending", "createdAt": "1970-01-01T00:00:01Z"}));
            store.seed(Collection::Bookings, "c", json!({"status": "confirmed", "createdAt": 5000}));
        }

        let query = ListQuery::new(Collection::Bookings, vec![Filter::eq("status", "pending")]);
        let from_indexed: Vec<String> = query.execute(&indexed).await.unwrap().into_iter().map(|d| d.id).collect();
        let from_bare: Vec<String> = query.execute(&bare).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(from_indexed, vec!["b", "a"]);
        assert_eq!(from_bare, from_indexed);
    }

    #[tokio::test]
    async fn test_other_errors_do_not_fall_back() {
        let store = MemoryStore::new(IndexSet::new());
        store.set_offline(true);
        let query = ListQuery::new(Collection::Bookings, vec![Filter::eq("status", "pending")]);
        let err = query.execute(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.calls(), 1);
    }
}
