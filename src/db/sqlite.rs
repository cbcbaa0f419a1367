use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::{
    migrations, strip_managed, validate_field, Collection, Direction, Document, EntityStore,
    Filter, FilterOp, IndexSet, OrderBy, StoreError,
};

/// Document store over a single SQLite table, one JSON body per row.
/// Timestamps are written as ISO-8601 strings.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    indexes: IndexSet,
}

impl SqliteStore {
    pub fn open(path: &str, indexes: IndexSet) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("failed to set database pragmas")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            indexes,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn store_err(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ReadOnly)
        | Some(ErrorCode::PermissionDenied)
        | Some(ErrorCode::AuthorizationForStatementDenied) => {
            StoreError::PermissionDenied(e.to_string())
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn decode_body(collection: Collection, id: &str, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| {
        StoreError::InvalidInput(format!("corrupt {collection} document {id}: {e}"))
    })
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn json_path(field: &str) -> String {
    format!("json_extract(data, '$.{field}')")
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn create(&self, collection: Collection, doc: Value) -> Result<String, StoreError> {
        let Value::Object(mut map) = strip_managed(doc) else {
            return Err(StoreError::InvalidInput(format!(
                "{collection} documents must be JSON objects"
            )));
        };
        let now = now_iso();
        map.insert("createdAt".to_string(), Value::String(now.clone()));
        map.insert("updatedAt".to_string(), Value::String(now.clone()));

        let id = uuid::Uuid::new_v4().to_string();
        let body = Value::Object(map).to_string();
        self.lock()
            .execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![collection.as_str(), id, body, now],
            )
            .map_err(store_err)?;
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let raw: Option<String> = self
            .lock()
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        raw.map(|raw| {
            Ok(Document {
                id: id.to_string(),
                data: decode_body(collection, id, &raw)?,
            })
        })
        .transpose()
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        self.indexes.check(collection, filters, order_by)?;

        let mut sql = "SELECT id, data FROM documents WHERE collection = ?".to_string();
        let mut bind = vec![SqlValue::Text(collection.as_str().to_string())];

        for filter in filters {
            validate_field(&filter.field)?;
            match &filter.op {
                FilterOp::Eq(value) => {
                    sql.push_str(&format!(" AND {} = ?", json_path(&filter.field)));
                    bind.push(to_sql(value));
                }
                FilterOp::In(values) if values.is_empty() => return Ok(Vec::new()),
                FilterOp::In(values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    sql.push_str(&format!(" AND {} IN ({marks})", json_path(&filter.field)));
                    bind.extend(values.iter().map(to_sql));
                }
            }
        }

        if let Some(order) = order_by {
            validate_field(&order.field)?;
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {direction}", json_path(&order.field)));
        }
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let rows: Vec<(String, String)> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(&sql).map_err(store_err)?;
            let rows = stmt
                .query_map(params_from_iter(bind), |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(store_err)?;
            let collected = rows.collect::<Result<Vec<_>, _>>().map_err(store_err)?;
            collected
        };

        rows.into_iter()
            .map(|(id, raw)| {
                let data = decode_body(collection, &id, &raw)?;
                Ok(Document { id, data })
            })
            .collect()
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<(), StoreError> {
        let Value::Object(patch) = strip_managed(patch) else {
            return Err(StoreError::InvalidInput("patch must be a JSON object".to_string()));
        };

        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        let Some(raw) = raw else {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        };

        let mut data = decode_body(collection, id, &raw)?;
        let now = now_iso();
        if let Value::Object(map) = &mut data {
            for (key, value) in patch {
                map.insert(key, value);
            }
            map.insert("updatedAt".to_string(), Value::String(now.clone()));
        }

        conn.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![data.to_string(), now, collection.as_str(), id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let count = self
            .lock()
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
            )
            .map_err(store_err)?;
        if count == 0 {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }
        Ok(())
    }
}
