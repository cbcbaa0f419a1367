pub mod memory;
pub mod migrations;
pub mod query;
pub mod sqlite;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use memory::MemoryStore;
pub use query::ListQuery;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    IndexUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Providers,
    Services,
    Bookings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Providers => "providers",
            Collection::Services => "services",
            Collection::Bookings => "bookings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq(value.into()),
        }
    }

    pub fn any_of(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::In(values),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let actual = doc.get(&self.field).unwrap_or(&Value::Null);
        match &self.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::In(options) => options.iter().any(|v| v == actual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn newest_first() -> Self {
        Self {
            field: "createdAt".to_string(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Decodes the document body with its id folded in.
    pub fn decode<T: DeserializeOwned>(self, collection: Collection) -> Result<T, StoreError> {
        let Document { id, mut data } = self;
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        serde_json::from_value(data).map_err(|e| {
            StoreError::InvalidInput(format!("malformed {collection} document {id}: {e}"))
        })
    }
}

/// Generic remote entity store: eventually consistent, no cross-document
/// transactions, server-assigned `createdAt`/`updatedAt`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create(&self, collection: Collection, doc: Value) -> Result<String, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

/// Composite indexes a store has been provisioned with. Queries that both
/// filter and order need one covering the filter fields plus the order field.
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    indexes: BTreeSet<(Collection, Vec<String>, String)>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collection: Collection, filter_fields: &[&str], order_field: &str) -> Self {
        let mut fields: Vec<String> = filter_fields.iter().map(|f| f.to_string()).collect();
        fields.sort();
        fields.dedup();
        self.indexes.insert((collection, fields, order_field.to_string()));
        self
    }

    pub fn check(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<(), StoreError> {
        let Some(order) = order_by else {
            return Ok(());
        };
        if filters.is_empty() {
            return Ok(());
        }
        let mut fields: Vec<String> = filters.iter().map(|f| f.field.clone()).collect();
        fields.sort();
        fields.dedup();
        let key = (collection, fields, order.field.clone());
        if self.indexes.contains(&key) {
            Ok(())
        } else {
            Err(StoreError::IndexUnavailable(format!(
                "{collection}({} / {})",
                key.1.join(","),
                key.2
            )))
        }
    }
}

/// Indexes the service is deployed with. Status listings have none
/// and are served by the fallback path.
pub fn default_indexes() -> IndexSet {
    IndexSet::new()
        .with(Collection::Bookings, &["customerId"], "createdAt")
        .with(Collection::Bookings, &["providerId"], "createdAt")
}

pub(crate) fn validate_field(field: &str) -> Result<(), StoreError> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!("invalid field name: {field}")))
    }
}

/// Strips store-managed keys so callers cannot overwrite them.
pub(crate) fn strip_managed(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        map.remove("id");
        map.remove("createdAt");
        map.remove("updatedAt");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let doc = json!({"status": "confirmed", "providerId": "p1"});
        assert!(Filter::eq("status", "confirmed").matches(&doc));
        assert!(!Filter::eq("status", "pending").matches(&doc));
        assert!(Filter::any_of("status", vec![json!("pending"), json!("confirmed")]).matches(&doc));
        assert!(!Filter::eq("missing", "x").matches(&doc));
    }

    #[test]
    fn test_index_required_only_for_filter_plus_order() {
        let indexes = IndexSet::new().with(Collection::Bookings, &["customerId"], "createdAt");
        let order = OrderBy::newest_first();

        assert!(indexes.check(Collection::Bookings, &[], Some(&order)).is_ok());
        assert!(indexes
            .check(Collection::Bookings, &[Filter::eq("status", "pending")], None)
            .is_ok());
        assert!(indexes
            .check(Collection::Bookings, &[Filter::eq("customerId", "c1")], Some(&order))
            .is_ok());
        assert!(matches!(
            indexes.check(Collection::Bookings, &[Filter::eq("status", "pending")], Some(&order)),
            Err(StoreError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_decode_folds_in_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }
        let doc = Document {
            id: "abc".to_string(),
            data: json!({"name": "Tutor"}),
        };
        let named: Named = doc.decode(Collection::Providers).unwrap();
        assert_eq!(named.id, "abc");
        assert_eq!(named.name, "Tutor");
    }

    #[test]
    fn test_validate_field() {
        assert!(validate_field("createdAt").is_ok());
        assert!(validate_field("a.b").is_err());
        assert!(validate_field("x') OR 1=1 --").is_err());
    }
}
