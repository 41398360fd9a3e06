use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};

use super::store::{Item, ItemKey, SortOrder, StoreError, StoreResult, Table};

/// `Table` stored as rows of the shared `smart_office_items` relation,
/// namespaced by collection name.
#[derive(Clone)]
pub struct PgTable {
    name: String,
    pool: PgPool,
}

impl PgTable {
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    fn decode(&self, row: &sqlx::postgres::PgRow) -> StoreResult<Item> {
        let Json(value): Json<Value> = row.try_get("item")?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::InvalidItem {
                collection: self.name.clone(),
                message: format!("stored item is not an object: {}", other),
            }),
        }
    }
}

#[async_trait]
impl Table for PgTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<Item>> {
        let row = sqlx::query(
            "SELECT item FROM smart_office_items WHERE collection = $1 AND pk = $2 AND sk = $3",
        )
        .bind(&self.name)
        .bind(&key.partition)
        .bind(&key.sort)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.decode(&r)).transpose()
    }

    async fn put(&self, key: &ItemKey, item: Item) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO smart_office_items (collection, pk, sk, item)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, pk, sk) DO UPDATE SET item = EXCLUDED.item
            "#,
        )
        .bind(&self.name)
        .bind(&key.partition)
        .bind(&key.sort)
        .bind(Json(Value::Object(item)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &ItemKey, item: Item) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO smart_office_items (collection, pk, sk, item)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, pk, sk) DO NOTHING
            "#,
        )
        .bind(&self.name)
        .bind(&key.partition)
        .bind(&key.sort)
        .bind(Json(Value::Object(item)))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed {
                collection: self.name.clone(),
                partition: key.partition.clone(),
                sort: key.sort.clone(),
            });
        }
        Ok(())
    }

    async fn update_existing(&self, key: &ItemKey, fields: Item) -> StoreResult<Option<Item>> {
        let row = sqlx::query(
            r#"
            UPDATE smart_office_items SET item = item || $4
            WHERE collection = $1 AND pk = $2 AND sk = $3
            RETURNING item
            "#,
        )
        .bind(&self.name)
        .bind(&key.partition)
        .bind(&key.sort)
        .bind(Json(Value::Object(fields)))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.decode(&r)).transpose()
    }

    async fn delete(&self, key: &ItemKey) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM smart_office_items WHERE collection = $1 AND pk = $2 AND sk = $3",
        )
        .bind(&self.name)
        .bind(&key.partition)
        .bind(&key.sort)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        partition: &str,
        order: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>> {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        // LIMIT NULL means no limit
        let sql = format!(
            "SELECT item FROM smart_office_items WHERE collection = $1 AND pk = $2 ORDER BY sk {} LIMIT $3",
            direction
        );
        let rows = sqlx::query(&sql)
            .bind(&self.name)
            .bind(partition)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|r| self.decode(r)).collect()
    }

    async fn scan_eq(&self, attribute: &str, value: &Value) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT item FROM smart_office_items
            WHERE collection = $1 AND item -> $2 = $3
            ORDER BY pk, sk
            "#,
        )
        .bind(&self.name)
        .bind(attribute)
        .bind(Json(value.clone()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| self.decode(r)).collect()
    }
}

/// `LIMIT` parameter; oversized limits saturate instead of wrapping negative
fn sql_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX))
}
