//! Device identity registry contract.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::database::StoreError;

pub mod local;

pub use local::LocalDeviceRegistry;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Thing not found: {0}")]
    ThingNotFound(String),

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Certificate issuance failed: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("Device registry store: {0}")]
    Store(#[from] StoreError),
}

/// Freshly minted credential. The private key is never kept by the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCredential {
    pub certificate_arn: String,
    pub certificate_id: String,
    pub certificate_pem: String,
    pub private_key: String,
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Register a thing; an existing thing of the same name is reused
    async fn create_thing(&self, thing_name: &str) -> DeviceResult<()>;

    /// Mint a new active key pair and certificate
    async fn create_keys_and_certificate(&self, common_name: &str) -> DeviceResult<DeviceCredential>;

    async fn attach_policy(&self, policy_name: &str, certificate_arn: &str) -> DeviceResult<()>;

    async fn attach_thing_principal(&self, thing_name: &str, certificate_arn: &str) -> DeviceResult<()>;

    /// Root CA certificate devices use to trust the broker
    fn root_ca(&self) -> String;
}
