//! Serde models for the tenant-scoped and device-scoped collections.
//!
//! Field names serialize in camelCase so stored items keep the attribute
//! names the deployed collections already use.

pub mod entity;
pub mod field;
pub mod manager;
pub mod office;
pub mod organization;
pub mod reading;
pub mod room;
pub mod user;

pub use entity::TenantEntity;
pub use field::{field_names, FieldKind, UpdatableField};
pub use manager::Manager;
pub use office::Office;
pub use organization::Organization;
pub use reading::SensorReading;
pub use room::Room;
pub use user::UserProfile;
