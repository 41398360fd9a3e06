//! Keyed-collection abstraction shared by every store.
//!
//! Each collection is addressed by a partition key and a sort key and holds
//! JSON items. Backends only need to provide the handful of primitives the
//! services rely on: point reads/writes, conditional writes, partition
//! queries in sort-key order and attribute-equality scans.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored item: a flat JSON object
pub type Item = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found the key already present
    #[error("Conditional write failed on {collection}: {partition}/{sort} already exists")]
    ConditionFailed {
        collection: String,
        partition: String,
        sort: String,
    },

    #[error("Invalid item in {collection}: {message}")]
    InvalidItem { collection: String, message: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub partition: String,
    pub sort: String,
}

impl ItemKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Key for collections that only have a partition key
    pub fn partition_only(partition: impl Into<String>) -> Self {
        Self::new(partition, "")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[async_trait]
pub trait Table: Send + Sync {
    /// Collection name, used in logs and as the storage namespace
    fn name(&self) -> &str;

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<Item>>;

    /// Unconditional write (insert or replace)
    async fn put(&self, key: &ItemKey, item: Item) -> StoreResult<()>;

    /// Insert only when no item exists under `key`, otherwise `ConditionFailed`
    async fn put_if_absent(&self, key: &ItemKey, item: Item) -> StoreResult<()>;

    /// Merge `fields` into an existing item. Returns the merged item, or
    /// `None` without writing when the key is absent.
    async fn update_existing(&self, key: &ItemKey, fields: Item) -> StoreResult<Option<Item>>;

    /// Returns whether an item was removed
    async fn delete(&self, key: &ItemKey) -> StoreResult<bool>;

    /// All items in a partition ordered by sort key
    async fn query(
        &self,
        partition: &str,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>>;

    /// Full scan keeping items whose top-level `attribute` equals `value`
    async fn scan_eq(&self, attribute: &str, value: &Value) -> StoreResult<Vec<Item>>;
}

/// Serialize a model into an item
pub fn to_item<T: Serialize>(collection: &str, model: &T) -> StoreResult<Item> {
    match serde_json::to_value(model) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::InvalidItem {
            collection: collection.to_string(),
            message: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(StoreError::InvalidItem {
            collection: collection.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Deserialize an item into a model
pub fn from_item<T: DeserializeOwned>(collection: &str, item: Item) -> StoreResult<T> {
    serde_json::from_value(Value::Object(item)).map_err(|e| StoreError::InvalidItem {
        collection: collection.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        org_alias: String,
        count: i64,
    }

    #[test]
    fn models_map_to_camel_case_items() {
        let item = to_item("t", &Sample { org_alias: "Acme".into(), count: 2 }).unwrap();
        assert_eq!(item.get("orgAlias"), Some(&json!("Acme")));
        let back: Sample = from_item("t", item).unwrap();
        assert_eq!(back.count, 2);
    }

    #[test]
    fn non_object_models_are_rejected() {
        let err = to_item("t", &vec![1, 2]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem { .. }));
    }
}
