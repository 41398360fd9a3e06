//! Orchestration over the stores, the identity provider and the device registry.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::models::{field_names, UpdatableField};
use crate::database::{Item, StoreError};
use crate::device::DeviceError;
use crate::identity::IdentityError;

pub mod auth_service;
pub mod office_service;
pub mod role_resolution;
pub mod room_service;
pub mod telemetry_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use office_service::OfficeService;
pub use role_resolution::{AccessDenied, RoleResolution, RoleResolver};
pub use room_service::RoomService;
pub use telemetry_service::TelemetryService;
pub use user_service::UserService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// A secondary dependency failed after the primary write succeeded
    #[error("{0}")]
    Partial(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Fails with a validation error naming the first blank field
pub(crate) fn require(fields: &[(&str, &str)]) -> ServiceResult<()> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(ServiceError::Validation(format!("{} is required", name))),
        None => Ok(()),
    }
}

/// Keep the allow-listed keys of an update payload, rejecting any value whose
/// shape the stored model could not read back. Fails when nothing is left.
pub(crate) fn allowed_fields(updates: &Map<String, Value>, allowed: &[UpdatableField]) -> ServiceResult<Item> {
    let mut kept = Item::new();
    for (key, value) in updates {
        let Some((name, kind)) = allowed.iter().find(|(name, _)| *name == key.as_str()) else {
            continue;
        };
        if !kind.accepts(value) {
            return Err(ServiceError::Validation(format!("{} must be {}", name, kind.describe())));
        }
        kept.insert(key.clone(), value.clone());
    }

    if kept.is_empty() {
        return Err(ServiceError::Validation(format!(
            "No valid fields to update. Allowed: {}",
            field_names(allowed)
        )));
    }
    Ok(kept)
}
