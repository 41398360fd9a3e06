use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::{allowed_fields, require, ServiceError, ServiceResult};
use crate::database::models::room::ROOM_CONFIG_FIELDS;
use crate::database::models::Room;
use crate::database::{Item, RoomStore, StoreError, TenantDirectory};
use crate::device::DeviceRegistry;

/// Credential bundle handed back once; only the certificate reference is kept
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedRoom {
    pub room_id: String,
    pub office_id: String,
    pub thing_name: String,
    pub certificate_arn: String,
    pub certificate_pem: String,
    pub private_key: String,
    pub root_ca: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomList {
    pub office_id: String,
    pub room_count: usize,
    pub rooms: Vec<Room>,
}

/// Device provisioning and room configuration
#[derive(Clone)]
pub struct RoomService {
    tenants: TenantDirectory,
    rooms: RoomStore,
    devices: Arc<dyn DeviceRegistry>,
    policy_name: String,
}

impl RoomService {
    pub fn new(
        tenants: TenantDirectory,
        rooms: RoomStore,
        devices: Arc<dyn DeviceRegistry>,
        policy_name: impl Into<String>,
    ) -> Self {
        Self {
            tenants,
            rooms,
            devices,
            policy_name: policy_name.into(),
        }
    }

    /// Office name with whitespace removed, or the office id when the lookup fails
    async fn device_prefix(&self, org_alias: &str, office_id: &str) -> String {
        let name = match self.tenants.office(org_alias, office_id).await {
            Ok(Some(office)) => office.name,
            Ok(None) => office_id.to_string(),
            Err(e) => {
                warn!("Office lookup for {} failed, using id as name: {}", office_id, e);
                office_id.to_string()
            }
        };
        name.split_whitespace().collect()
    }

    /// Bind a new room to a fresh device identity. An existing room is a conflict.
    pub async fn provision(&self, org_alias: &str, office_id: &str, room_id: &str) -> ServiceResult<ProvisionedRoom> {
        require(&[("officeId", office_id), ("roomId", room_id), ("orgAlias", org_alias)])?;

        if self.rooms.get(office_id, room_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Room {} already exists in office {}",
                room_id, office_id
            )));
        }

        let thing_name = format!("{}_{}", self.device_prefix(org_alias, office_id).await, room_id);
        self.devices.create_thing(&thing_name).await?;
        let credential = self.devices.create_keys_and_certificate(&thing_name).await?;

        if let Err(e) = self
            .devices
            .attach_policy(&self.policy_name, &credential.certificate_arn)
            .await
        {
            warn!("Could not attach policy {} to {}: {}", self.policy_name, thing_name, e);
        }
        self.devices
            .attach_thing_principal(&thing_name, &credential.certificate_arn)
            .await?;

        let room = Room::provisioned(office_id, room_id, &thing_name, &credential.certificate_arn);
        match self.rooms.create(&room).await {
            Ok(()) => {}
            Err(StoreError::ConditionFailed { .. }) => {
                return Err(ServiceError::Conflict(format!(
                    "Room {} already exists in office {}",
                    room_id, office_id
                )));
            }
            Err(e) => return Err(e.into()),
        }
        info!("Provisioned room {} in office {} as {}", room_id, office_id, thing_name);

        Ok(ProvisionedRoom {
            room_id: room.room_id,
            office_id: room.office_id,
            thing_name,
            certificate_arn: credential.certificate_arn,
            certificate_pem: credential.certificate_pem,
            private_key: credential.private_key,
            root_ca: self.devices.root_ca(),
        })
    }

    pub async fn list(&self, office_id: &str) -> ServiceResult<RoomList> {
        require(&[("officeId", office_id)])?;
        let rooms = self.rooms.by_office(office_id).await?;
        Ok(RoomList {
            office_id: office_id.to_string(),
            room_count: rooms.len(),
            rooms,
        })
    }

    pub async fn config(&self, office_id: &str, room_id: &str) -> ServiceResult<Room> {
        require(&[("officeId", office_id), ("roomId", room_id)])?;
        self.rooms
            .get(office_id, room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Room configuration not found".to_string()))
    }

    /// Write allow-listed control fields and stamp `lastUpdate`.
    /// Returns the attributes written.
    pub async fn update_config(
        &self,
        office_id: &str,
        room_id: &str,
        updates: &Map<String, Value>,
    ) -> ServiceResult<Item> {
        require(&[("officeId", office_id), ("roomId", room_id)])?;

        let mut fields = allowed_fields(updates, ROOM_CONFIG_FIELDS)?;
        fields.insert("lastUpdate".to_string(), json!(Utc::now().to_rfc3339()));

        let written = fields.clone();
        self.rooms
            .update_config(office_id, room_id, fields)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Room configuration not found".to_string()))?;
        info!("Updated room {} config: {:?}", room_id, written.keys().collect::<Vec<_>>());
        Ok(written)
    }
}
