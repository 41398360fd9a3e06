//! Typed repositories over the keyed collections.
//!
//! Key layout per collection:
//! - tenant directory: `orgAlias` / `entityId` (`organization` or `OFFICE#<id>`)
//! - manager registry: `orgAlias` / `userId`
//! - user directory: `userId`
//! - room config: `roomId` / `officeId`
//! - sensor log: `roomId` / zero-padded timestamp

use serde_json::{json, Value};
use std::sync::Arc;

use super::models::{Manager, Office, Organization, Room, SensorReading, TenantEntity, UserProfile};
use super::store::{from_item, to_item, Item, ItemKey, SortOrder, StoreResult, Table};

/// Organization and office rows, partitioned by tenant alias
#[derive(Clone)]
pub struct TenantDirectory {
    table: Arc<dyn Table>,
}

impl TenantDirectory {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    /// Whether any row exists under the tenant alias
    pub async fn tenant_exists(&self, org_alias: &str) -> StoreResult<bool> {
        let rows = self
            .table
            .query(org_alias, SortOrder::Ascending, Some(1))
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn organization(&self, org_alias: &str) -> StoreResult<Option<Organization>> {
        let key = ItemKey::new(org_alias, TenantEntity::Organization.to_string());
        self.table
            .get(&key)
            .await?
            .map(|item| from_item(self.table.name(), item))
            .transpose()
    }

    /// Insert the organization row; `ConditionFailed` if it already exists
    pub async fn create_organization(&self, org: &Organization) -> StoreResult<()> {
        let key = ItemKey::new(&org.org_alias, &org.entity_id);
        let item = to_item(self.table.name(), org)?;
        self.table.put_if_absent(&key, item).await
    }

    /// Re-mark an existing organization verified
    pub async fn reverify_organization(&self, org_alias: &str, user_sub: Option<&str>) -> StoreResult<bool> {
        let key = ItemKey::new(org_alias, TenantEntity::Organization.to_string());
        let mut fields = Item::new();
        fields.insert("verified".into(), Value::Bool(true));
        if let Some(sub) = user_sub {
            fields.insert("userSub".into(), json!(sub));
        }
        Ok(self.table.update_existing(&key, fields).await?.is_some())
    }

    /// Point the organization at a renamed admin login
    pub async fn set_admin_email(&self, org_alias: &str, admin_email: &str) -> StoreResult<bool> {
        let key = ItemKey::new(org_alias, TenantEntity::Organization.to_string());
        let mut fields = Item::new();
        fields.insert("adminEmail".into(), json!(admin_email));
        Ok(self.table.update_existing(&key, fields).await?.is_some())
    }

    pub async fn office(&self, org_alias: &str, office_id: &str) -> StoreResult<Option<Office>> {
        let key = ItemKey::new(org_alias, TenantEntity::office(office_id).to_string());
        self.table
            .get(&key)
            .await?
            .map(|item| from_item(self.table.name(), item))
            .transpose()
    }

    pub async fn put_office(&self, office: &Office) -> StoreResult<()> {
        let key = ItemKey::new(&office.org_alias, &office.entity_id);
        let item = to_item(self.table.name(), office)?;
        self.table.put(&key, item).await
    }

    pub async fn update_office(
        &self,
        org_alias: &str,
        office_id: &str,
        fields: Item,
    ) -> StoreResult<Option<Item>> {
        let key = ItemKey::new(org_alias, TenantEntity::office(office_id).to_string());
        self.table.update_existing(&key, fields).await
    }

    pub async fn delete_office(&self, org_alias: &str, office_id: &str) -> StoreResult<bool> {
        let key = ItemKey::new(org_alias, TenantEntity::office(office_id).to_string());
        self.table.delete(&key).await
    }

    /// Office rows of a tenant, skipping the organization row
    pub async fn offices(&self, org_alias: &str) -> StoreResult<Vec<Office>> {
        let rows = self
            .table
            .query(org_alias, SortOrder::Ascending, None)
            .await?;

        rows.into_iter()
            .filter(|item| {
                item.get("entityId")
                    .and_then(Value::as_str)
                    .and_then(TenantEntity::parse)
                    .is_some_and(|entity| matches!(entity, TenantEntity::Office(_)))
            })
            .map(|item| from_item(self.table.name(), item))
            .collect()
    }
}

/// Manager assignments, partitioned by tenant alias
#[derive(Clone)]
pub struct ManagerRegistry {
    table: Arc<dyn Table>,
}

impl ManagerRegistry {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    pub async fn put(&self, manager: &Manager) -> StoreResult<()> {
        let key = ItemKey::new(&manager.org_alias, &manager.user_id);
        let item = to_item(self.table.name(), manager)?;
        self.table.put(&key, item).await
    }

    pub async fn list(&self, org_alias: &str) -> StoreResult<Vec<Manager>> {
        self.table
            .query(org_alias, SortOrder::Ascending, None)
            .await?
            .into_iter()
            .map(|item| from_item(self.table.name(), item))
            .collect()
    }

    /// First manager of the tenant with this e-mail
    pub async fn find_by_email(&self, org_alias: &str, email: &str) -> StoreResult<Option<Manager>> {
        Ok(self
            .list(org_alias)
            .await?
            .into_iter()
            .find(|m| m.manager_email == email))
    }

    /// First manager assigned to the office
    pub async fn find_by_office(&self, org_alias: &str, office_id: &str) -> StoreResult<Option<Manager>> {
        Ok(self
            .list(org_alias)
            .await?
            .into_iter()
            .find(|m| m.office_id() == Some(office_id)))
    }

    pub async fn update(
        &self,
        org_alias: &str,
        user_id: &str,
        fields: Item,
    ) -> StoreResult<Option<Item>> {
        self.table
            .update_existing(&ItemKey::new(org_alias, user_id), fields)
            .await
    }

    /// Move every assignment held under `old_email` to `new_email`.
    /// Returns how many records changed.
    pub async fn reassign_email(&self, org_alias: &str, old_email: &str, new_email: &str) -> StoreResult<usize> {
        let mut changed = 0;
        for manager in self.list(org_alias).await? {
            if manager.manager_email != old_email {
                continue;
            }
            let mut fields = Item::new();
            fields.insert("managerEmail".into(), json!(new_email));
            if self.update(org_alias, &manager.user_id, fields).await?.is_some() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub async fn delete(&self, org_alias: &str, user_id: &str) -> StoreResult<bool> {
        self.table.delete(&ItemKey::new(org_alias, user_id)).await
    }
}

/// Profiles keyed by identity subject id
#[derive(Clone)]
pub struct UserDirectory {
    table: Arc<dyn Table>,
}

impl UserDirectory {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    pub async fn get(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        self.table
            .get(&ItemKey::partition_only(user_id))
            .await?
            .map(|item| from_item(self.table.name(), item))
            .transpose()
    }

    pub async fn put(&self, profile: &UserProfile) -> StoreResult<()> {
        let item = to_item(self.table.name(), profile)?;
        self.table
            .put(&ItemKey::partition_only(&profile.user_id), item)
            .await
    }

    pub async fn update(&self, user_id: &str, fields: Item) -> StoreResult<Option<Item>> {
        self.table
            .update_existing(&ItemKey::partition_only(user_id), fields)
            .await
    }

    pub async fn by_company(&self, company_id: &str) -> StoreResult<Vec<UserProfile>> {
        self.table
            .scan_eq("companyId", &json!(company_id))
            .await?
            .into_iter()
            .map(|item| from_item(self.table.name(), item))
            .collect()
    }
}

/// Provisioned rooms and their control configuration
#[derive(Clone)]
pub struct RoomStore {
    table: Arc<dyn Table>,
}

impl RoomStore {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    pub async fn get(&self, office_id: &str, room_id: &str) -> StoreResult<Option<Room>> {
        self.table
            .get(&ItemKey::new(room_id, office_id))
            .await?
            .map(|item| from_item(self.table.name(), item))
            .transpose()
    }

    /// Insert a new room; `ConditionFailed` if the pair is already bound
    pub async fn create(&self, room: &Room) -> StoreResult<()> {
        let item = to_item(self.table.name(), room)?;
        self.table
            .put_if_absent(&ItemKey::new(&room.room_id, &room.office_id), item)
            .await
    }

    pub async fn update_config(
        &self,
        office_id: &str,
        room_id: &str,
        fields: Item,
    ) -> StoreResult<Option<Item>> {
        self.table
            .update_existing(&ItemKey::new(room_id, office_id), fields)
            .await
    }

    pub async fn by_office(&self, office_id: &str) -> StoreResult<Vec<Room>> {
        self.table
            .scan_eq("officeId", &json!(office_id))
            .await?
            .into_iter()
            .map(|item| from_item(self.table.name(), item))
            .collect()
    }
}

/// Append-only sensor log
#[derive(Clone)]
pub struct TelemetryStore {
    table: Arc<dyn Table>,
}

impl TelemetryStore {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    pub async fn append(&self, reading: &SensorReading) -> StoreResult<()> {
        let item = to_item(self.table.name(), reading)?;
        self.table
            .put(&ItemKey::new(&reading.room_id, reading.sort_key()), item)
            .await
    }

    /// Up to `limit` readings, newest first
    pub async fn latest(&self, room_id: &str, limit: usize) -> StoreResult<Vec<SensorReading>> {
        self.table
            .query(room_id, SortOrder::Descending, Some(limit))
            .await?
            .into_iter()
            .map(|item| from_item(self.table.name(), item))
            .collect()
    }
}
