//! Device registry backed by an `rcgen` certificate authority.
//!
//! Built with [`LocalDeviceRegistry::persistent`], the CA key pair and every
//! thing/certificate binding are written through to a `Table` and reloaded on
//! start, so issued device certificates keep chaining to the same root.

use async_trait::async_trait;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{DeviceCredential, DeviceError, DeviceRegistry, DeviceResult};
use crate::database::store::{from_item, to_item};
use crate::database::{ItemKey, SortOrder, StoreError, Table};

const CA_COMMON_NAME: &str = "Smart Office Device CA";

const CA_PARTITION: &str = "ca";
const CA_SORT: &str = "root";
const THING_PARTITION: &str = "thing";
const CERTIFICATE_PARTITION: &str = "certificate";

/// CA material as stored; the key never leaves the registry table
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCa {
    key_pem: String,
    certificate_pem: String,
}

/// A thing with its certificates, or a certificate with its policies
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredBinding {
    name: String,
    attached: BTreeSet<String>,
}

#[derive(Default)]
struct Registry {
    /// thing name -> attached certificate arns
    things: HashMap<String, BTreeSet<String>>,
    /// certificate arn -> attached policies
    certificates: HashMap<String, BTreeSet<String>>,
    policies: HashSet<String>,
}

pub struct LocalDeviceRegistry {
    ca_pem: String,
    issuer: Issuer<'static, KeyPair>,
    registry: RwLock<Registry>,
    store: Option<Arc<dyn Table>>,
}

impl LocalDeviceRegistry {
    /// Registry with a throwaway CA held only in memory.
    /// `policies` are the policy names devices may be bound to.
    pub fn new<I, S>(policies: I) -> DeviceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ca = generate_ca()?;
        Ok(Self {
            issuer: load_issuer(&ca.key_pem)?,
            ca_pem: ca.certificate_pem,
            registry: RwLock::new(Registry {
                policies: policies.into_iter().map(Into::into).collect(),
                ..Registry::default()
            }),
            store: None,
        })
    }

    /// Registry whose CA and bindings live in `store`. The CA is created on
    /// first start and reused afterwards.
    pub async fn persistent<I, S>(policies: I, store: Arc<dyn Table>) -> DeviceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ca = load_or_create_ca(store.as_ref()).await?;

        let mut registry = Registry {
            policies: policies.into_iter().map(Into::into).collect(),
            ..Registry::default()
        };
        for binding in load_bindings(store.as_ref(), THING_PARTITION).await? {
            registry.things.insert(binding.name, binding.attached);
        }
        for binding in load_bindings(store.as_ref(), CERTIFICATE_PARTITION).await? {
            registry.certificates.insert(binding.name, binding.attached);
        }
        info!(
            "Loaded device registry from {}: {} things, {} certificates",
            store.name(),
            registry.things.len(),
            registry.certificates.len()
        );

        Ok(Self {
            issuer: load_issuer(&ca.key_pem)?,
            ca_pem: ca.certificate_pem,
            registry: RwLock::new(registry),
            store: Some(store),
        })
    }

    /// Certificates attached to a thing
    pub async fn principals(&self, thing_name: &str) -> Vec<String> {
        self.registry
            .read()
            .await
            .things
            .get(thing_name)
            .map(|arns| arns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Policies attached to a certificate
    pub async fn policies_for(&self, certificate_arn: &str) -> Vec<String> {
        self.registry
            .read()
            .await
            .certificates
            .get(certificate_arn)
            .map(|policies| policies.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn save(&self, partition: &str, name: &str, attached: &BTreeSet<String>) -> DeviceResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let binding = StoredBinding {
            name: name.to_string(),
            attached: attached.clone(),
        };
        store
            .put(&ItemKey::new(partition, name), to_item(store.name(), &binding)?)
            .await?;
        Ok(())
    }
}

fn ca_params() -> CertificateParams {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name = distinguished_name(CA_COMMON_NAME);
    params
}

fn generate_ca() -> DeviceResult<StoredCa> {
    let key = KeyPair::generate()?;
    let cert = ca_params().self_signed(&key)?;
    Ok(StoredCa {
        key_pem: key.serialize_pem(),
        certificate_pem: cert.pem(),
    })
}

fn load_issuer(key_pem: &str) -> DeviceResult<Issuer<'static, KeyPair>> {
    let key = KeyPair::from_pem(key_pem)?;
    Ok(Issuer::new(ca_params(), key))
}

async fn load_or_create_ca(store: &dyn Table) -> DeviceResult<StoredCa> {
    let key = ItemKey::new(CA_PARTITION, CA_SORT);
    if let Some(item) = store.get(&key).await? {
        return Ok(from_item(store.name(), item)?);
    }

    let fresh = generate_ca()?;
    match store.put_if_absent(&key, to_item(store.name(), &fresh)?).await {
        Ok(()) => {
            info!("Created device CA in {}", store.name());
            Ok(fresh)
        }
        // Another instance created it first
        Err(StoreError::ConditionFailed { .. }) => {
            let item = store
                .get(&key)
                .await?
                .ok_or_else(|| StoreError::Backend("device CA disappeared after a conflicting write".to_string()))?;
            Ok(from_item(store.name(), item)?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn load_bindings(store: &dyn Table, partition: &str) -> DeviceResult<Vec<StoredBinding>> {
    store
        .query(partition, SortOrder::Ascending, None)
        .await?
        .into_iter()
        .map(|item| from_item(store.name(), item).map_err(DeviceError::from))
        .collect()
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name
}

#[async_trait]
impl DeviceRegistry for LocalDeviceRegistry {
    async fn create_thing(&self, thing_name: &str) -> DeviceResult<()> {
        let mut registry = self.registry.write().await;
        if registry.things.contains_key(thing_name) {
            debug!("Thing {} already exists, reusing", thing_name);
            return Ok(());
        }
        let attached = BTreeSet::new();
        self.save(THING_PARTITION, thing_name, &attached).await?;
        registry.things.insert(thing_name.to_string(), attached);
        info!("Created thing {}", thing_name);
        Ok(())
    }

    async fn create_keys_and_certificate(&self, common_name: &str) -> DeviceResult<DeviceCredential> {
        let key = KeyPair::generate()?;
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(common_name);
        params.is_ca = IsCa::NoCa;
        let cert = params.signed_by(&key, &self.issuer)?;

        let certificate_pem = cert.pem();
        let certificate_id = format!("{:x}", Sha256::digest(certificate_pem.as_bytes()));
        let certificate_arn = format!("arn:local:iot:cert/{}", certificate_id);

        let mut registry = self.registry.write().await;
        let policies = BTreeSet::new();
        self.save(CERTIFICATE_PARTITION, &certificate_arn, &policies).await?;
        registry.certificates.insert(certificate_arn.clone(), policies);
        info!("Issued certificate {}", certificate_arn);

        Ok(DeviceCredential {
            certificate_arn,
            certificate_id,
            certificate_pem,
            private_key: key.serialize_pem(),
        })
    }

    async fn attach_policy(&self, policy_name: &str, certificate_arn: &str) -> DeviceResult<()> {
        let mut registry = self.registry.write().await;
        if !registry.policies.contains(policy_name) {
            return Err(DeviceError::PolicyNotFound(policy_name.to_string()));
        }
        let mut policies = registry
            .certificates
            .get(certificate_arn)
            .cloned()
            .ok_or_else(|| DeviceError::CertificateNotFound(certificate_arn.to_string()))?;
        policies.insert(policy_name.to_string());
        self.save(CERTIFICATE_PARTITION, certificate_arn, &policies).await?;
        registry.certificates.insert(certificate_arn.to_string(), policies);
        Ok(())
    }

    async fn attach_thing_principal(&self, thing_name: &str, certificate_arn: &str) -> DeviceResult<()> {
        let mut registry = self.registry.write().await;
        if !registry.certificates.contains_key(certificate_arn) {
            return Err(DeviceError::CertificateNotFound(certificate_arn.to_string()));
        }
        let mut principals = registry
            .things
            .get(thing_name)
            .cloned()
            .ok_or_else(|| DeviceError::ThingNotFound(thing_name.to_string()))?;
        principals.insert(certificate_arn.to_string());
        self.save(THING_PARTITION, thing_name, &principals).await?;
        registry.things.insert(thing_name.to_string(), principals);
        Ok(())
    }

    fn root_ca(&self) -> String {
        self.ca_pem.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTable;

    const POLICY: &str = "SmartOffice-DevicePolicy";

    #[tokio::test]
    async fn credentials_are_unique_and_bindable() {
        let registry = LocalDeviceRegistry::new([POLICY]).unwrap();
        registry.create_thing("HQ_r1").await.unwrap();
        registry.create_thing("HQ_r1").await.unwrap();

        let first = registry.create_keys_and_certificate("HQ_r1").await.unwrap();
        let second = registry.create_keys_and_certificate("HQ_r1").await.unwrap();
        assert_ne!(first.certificate_arn, second.certificate_arn);
        assert!(first.certificate_pem.contains("BEGIN CERTIFICATE"));
        assert!(first.private_key.contains("PRIVATE KEY"));
        assert!(registry.root_ca().contains("BEGIN CERTIFICATE"));

        registry.attach_policy(POLICY, &first.certificate_arn).await.unwrap();
        registry.attach_thing_principal("HQ_r1", &first.certificate_arn).await.unwrap();
        assert_eq!(registry.principals("HQ_r1").await, vec![first.certificate_arn.clone()]);
        assert_eq!(registry.policies_for(&first.certificate_arn).await, vec![POLICY]);
    }

    #[tokio::test]
    async fn unknown_targets_are_rejected() {
        let registry = LocalDeviceRegistry::new([POLICY]).unwrap();
        let cred = registry.create_keys_and_certificate("x").await.unwrap();
        assert!(matches!(
            registry.attach_policy("Other", &cred.certificate_arn).await,
            Err(DeviceError::PolicyNotFound(_))
        ));
        assert!(matches!(
            registry.attach_thing_principal("missing", &cred.certificate_arn).await,
            Err(DeviceError::ThingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn persistent_registry_keeps_its_ca_and_bindings_across_restarts() {
        let table: Arc<dyn Table> = Arc::new(InMemoryTable::new("DeviceRegistry"));

        let before = LocalDeviceRegistry::persistent([POLICY], table.clone()).await.unwrap();
        before.create_thing("HQ_r1").await.unwrap();
        let cred = before.create_keys_and_certificate("HQ_r1").await.unwrap();
        before.attach_policy(POLICY, &cred.certificate_arn).await.unwrap();
        before.attach_thing_principal("HQ_r1", &cred.certificate_arn).await.unwrap();

        let after = LocalDeviceRegistry::persistent([POLICY], table).await.unwrap();
        assert_eq!(after.root_ca(), before.root_ca());
        assert_eq!(after.principals("HQ_r1").await, vec![cred.certificate_arn.clone()]);
        assert_eq!(after.policies_for(&cred.certificate_arn).await, vec![POLICY]);

        let next = after.create_keys_and_certificate("HQ_r2").await.unwrap();
        assert!(next.certificate_pem.contains("BEGIN CERTIFICATE"));
    }

    #[tokio::test]
    async fn in_memory_registries_each_get_their_own_ca() {
        let a = LocalDeviceRegistry::new([POLICY]).unwrap();
        let b = LocalDeviceRegistry::new([POLICY]).unwrap();
        assert_ne!(a.root_ca(), b.root_ca());
    }
}
