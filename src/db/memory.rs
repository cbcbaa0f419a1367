use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    strip_managed, validate_field, Collection, Direction, Document, EntityStore, Filter, IndexSet,
    OrderBy, StoreError,
};
use crate::models::Timestamp;

/// In-process document store. Timestamps are written as epoch millis.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    indexes: IndexSet,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(indexes: IndexSet) -> Self {
        Self {
            indexes,
            ..Self::default()
        }
    }

    /// Inserts a document as-is, timestamps included.
    pub fn seed(&self, collection: Collection, id: &str, doc: Value) {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.entry(collection)
            .or_default()
            .insert(id.to_string(), doc);
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Number of store calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

fn compare_fields(a: &Value, b: &Value, field: &str) -> Ordering {
    let (a, b) = (a.get(field), b.get(field));
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) if field != "createdAt" && field != "updatedAt" => {
            x.cmp(y)
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Timestamp::from_value(a).cmp(&Timestamp::from_value(b)),
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create(&self, collection: Collection, doc: Value) -> Result<String, StoreError> {
        self.enter()?;
        let Value::Object(mut map) = strip_managed(doc) else {
            return Err(StoreError::InvalidInput(format!(
                "{collection} documents must be JSON objects"
            )));
        };
        let now = Timestamp::now().millis();
        map.insert("createdAt".to_string(), Value::from(now));
        map.insert("updatedAt".to_string(), Value::from(now));

        let id = uuid::Uuid::new_v4().to_string();
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.entry(collection)
            .or_default()
            .insert(id.clone(), Value::Object(map));
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter()?;
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs
            .get(&collection)
            .and_then(|c| c.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        self.enter()?;
        for filter in filters {
            validate_field(&filter.field)?;
        }
        self.indexes.check(collection, filters, order_by)?;

        let mut results: Vec<Document> = {
            let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
            docs.get(&collection)
                .map(|c| {
                    c.iter()
                        .filter(|(_, data)| filters.iter().all(|f| f.matches(data)))
                        .map(|(id, data)| Document {
                            id: id.clone(),
                            data: data.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(order) = order_by {
            results.sort_by(|a, b| {
                let ord = compare_fields(&a.data, &b.data, &order.field);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<(), StoreError> {
        self.enter()?;
        let Value::Object(patch) = strip_managed(patch) else {
            return Err(StoreError::InvalidInput("patch must be a JSON object".to_string()));
        };
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(Value::Object(existing)) = docs.get_mut(&collection).and_then(|c| c.get_mut(id))
        else {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        };
        for (key, value) in patch {
            existing.insert(key, value);
        }
        existing.insert("updatedAt".to_string(), Value::from(Timestamp::now().millis()));
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.enter()?;
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.get_mut(&collection)
            .and_then(|c| c.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))
    }
}
