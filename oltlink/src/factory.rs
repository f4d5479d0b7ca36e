//! Vendor registry.
//!
//! [`AdapterFactory`] maps vendor names (case-insensitive) onto adapter
//! constructors and the protocol each vendor speaks by default.
//!
//! ```rust,no_run
//! use oltlink::{AdapterConfig, AdapterFactory};
//! use secrecy::SecretString;
//!
//! # async fn example() -> oltlink::Result<()> {
//! let factory = AdapterFactory::new();
//! let config = AdapterConfig::new("10.0.0.1", "admin", SecretString::from("secret"));
//!
//! let mut adapter = factory.create_adapter("Huawei", config)?;
//! if adapter.connect().await {
//!     println!("{:?}", adapter.get_olt_info().await?);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::adapter::{
    AdapterConfig, AdapterConstructor, OltAdapter, ProxyTarget, SecureAdapterProxy,
};
use crate::credentials::CredentialVault;
use crate::error::{Error, Result};
use crate::model::OltDevice;
use crate::transport::Protocol;
use crate::vendors::huawei::{self, HuaweiAdapter};
use crate::vendors::zte::{self, ZteAdapter};

#[derive(Clone)]
struct Registration {
    default_protocol: Protocol,
    constructor: AdapterConstructor,
}

/// Creates disconnected adapters by vendor name.
///
/// Each factory owns its registry, so registrations made on one instance
/// never leak into another.
#[derive(Clone)]
pub struct AdapterFactory {
    registry: HashMap<String, Registration>,
}

fn huawei_adapter(config: AdapterConfig) -> Result<Box<dyn OltAdapter>> {
    Ok(Box::new(HuaweiAdapter::new(config)?))
}

fn zte_adapter(config: AdapterConfig) -> Result<Box<dyn OltAdapter>> {
    Ok(Box::new(ZteAdapter::new(config)?))
}

impl AdapterFactory {
    /// A factory with the built-in vendors (`huawei`, `zte`) registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register_adapter(
            huawei::VENDOR,
            huawei::profile().default_protocol,
            huawei_adapter,
        );
        factory.register_adapter(zte::VENDOR, zte::profile().default_protocol, zte_adapter);
        factory
    }

    /// A factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `vendor`.
    pub fn register_adapter<F>(&mut self, vendor: &str, default_protocol: Protocol, constructor: F)
    where
        F: Fn(AdapterConfig) -> Result<Box<dyn OltAdapter>> + Send + Sync + 'static,
    {
        let key = vendor.to_ascii_lowercase();
        debug!("Registering adapter for vendor {} ({})", key, default_protocol);
        self.registry.insert(
            key,
            Registration {
                default_protocol,
                constructor: Arc::new(constructor),
            },
        );
    }

    /// Registered vendor names, sorted.
    pub fn supported_vendors(&self) -> Vec<String> {
        let mut vendors: Vec<String> = self.registry.keys().cloned().collect();
        vendors.sort();
        vendors
    }

    pub fn is_supported(&self, vendor: &str) -> bool {
        self.registry.contains_key(&vendor.to_ascii_lowercase())
    }

    fn registration(&self, vendor: &str) -> Result<&Registration> {
        self.registry
            .get(&vendor.to_ascii_lowercase())
            .ok_or_else(|| Error::UnsupportedVendor {
                vendor: vendor.to_string(),
                supported: self.supported_vendors(),
            })
    }

    /// Build a disconnected adapter. Protocol and port default to the
    /// vendor's protocol and its well-known port.
    pub fn create_adapter(&self, vendor: &str, config: AdapterConfig) -> Result<Box<dyn OltAdapter>> {
        let registration = self.registration(vendor)?;
        let config = config.with_defaults(registration.default_protocol);
        debug!(
            "Creating {} adapter for {}:{}",
            vendor.to_ascii_lowercase(),
            config.host,
            config.port.unwrap_or_default()
        );
        (registration.constructor)(config)
    }

    /// Build a [`SecureAdapterProxy`] for an inventory device from its
    /// vault entry. Nothing is decrypted here.
    pub fn create_secure_adapter(
        &self,
        device: &OltDevice,
        vault: &CredentialVault,
    ) -> Result<SecureAdapterProxy> {
        let registration = self.registration(&device.vendor)?;
        let stored = vault.get_encrypted(&device.credential_ref)?;

        let protocol = device.protocol.unwrap_or(registration.default_protocol);
        let mut target = ProxyTarget::new(
            device.vendor.to_ascii_lowercase(),
            &device.host,
            &stored.username,
        )
        .with_protocol(protocol)
        .with_port(device.port.unwrap_or(protocol.default_port()));
        target.model = device.model.clone();

        debug!("Creating secure {} adapter for device {}", target.vendor, device.id);
        Ok(SecureAdapterProxy::new(
            registration.constructor.clone(),
            target,
            stored.password.clone(),
            vault.encryption_key().clone(),
        ))
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("vendors", &self.supported_vendors())
            .finish()
    }
}
