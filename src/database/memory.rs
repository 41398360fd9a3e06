//! In-memory `Table` used for development and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{Item, ItemKey, SortOrder, StoreError, StoreResult, Table};

/// Thread-safe collection: partition -> sort key -> item
#[derive(Clone)]
pub struct InMemoryTable {
    name: String,
    data: Arc<RwLock<HashMap<String, BTreeMap<String, Item>>>>,
}

impl InMemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored items across all partitions
    pub async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Table for InMemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<Item>> {
        let data = self.data.read().await;
        Ok(data
            .get(&key.partition)
            .and_then(|partition| partition.get(&key.sort))
            .cloned())
    }

    async fn put(&self, key: &ItemKey, item: Item) -> StoreResult<()> {
        let mut data = self.data.write().await;
        data.entry(key.partition.clone())
            .or_default()
            .insert(key.sort.clone(), item);
        Ok(())
    }

    async fn put_if_absent(&self, key: &ItemKey, item: Item) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let partition = data.entry(key.partition.clone()).or_default();
        if partition.contains_key(&key.sort) {
            return Err(StoreError::ConditionFailed {
                collection: self.name.clone(),
                partition: key.partition.clone(),
                sort: key.sort.clone(),
            });
        }
        partition.insert(key.sort.clone(), item);
        Ok(())
    }

    async fn update_existing(&self, key: &ItemKey, fields: Item) -> StoreResult<Option<Item>> {
        let mut data = self.data.write().await;
        let Some(existing) = data
            .get_mut(&key.partition)
            .and_then(|partition| partition.get_mut(&key.sort))
        else {
            return Ok(None);
        };
        for (field, value) in fields {
            existing.insert(field, value);
        }
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, key: &ItemKey) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        let Some(partition) = data.get_mut(&key.partition) else {
            return Ok(false);
        };
        let removed = partition.remove(&key.sort).is_some();
        if partition.is_empty() {
            data.remove(&key.partition);
        }
        Ok(removed)
    }

    async fn query(
        &self,
        partition: &str,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>> {
        let data = self.data.read().await;
        let Some(items) = data.get(partition) else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(usize::MAX);
        let result = match order {
            SortOrder::Ascending => items.values().take(limit).cloned().collect(),
            SortOrder::Descending => items.values().rev().take(limit).cloned().collect(),
        };
        Ok(result)
    }

    async fn scan_eq(&self, attribute: &str, value: &Value) -> StoreResult<Vec<Item>> {
        let data = self.data.read().await;
        Ok(data
            .values()
            .flat_map(BTreeMap::values)
            .filter(|item| item.get(attribute) == Some(value))
            .cloned()
            .collect())
    }
}
