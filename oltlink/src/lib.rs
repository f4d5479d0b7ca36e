//! # oltlink
//!
//! Async multi-vendor management of GPON OLTs over their SSH or Telnet CLI.
//!
//! oltlink drives the vendor command line the way an operator would and
//! turns the screen output into typed records, behind one vendor-agnostic
//! [`OltAdapter`] trait.
//!
//! ## Features
//!
//! - SSH (russh) and Telnet transports with one-shot reconnect and retry
//! - Huawei MA5600T/MA5800 and ZTE C300/C320/C600 adapters
//! - Output parsing framework for CLI tables and `key : value` blocks
//! - Encrypted credential vault and a proxy that decrypts only on use
//! - Bounded adapter pool for concurrent work against one OLT
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oltlink::{AdapterConfig, AdapterFactory, OntRef, ProvisionRequest};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oltlink::Error> {
//!     let factory = AdapterFactory::new();
//!     let config = AdapterConfig::new("192.168.1.1", "admin", SecretString::from("secret"));
//!     let mut olt = factory.create_adapter("huawei", config)?;
//!
//!     if !olt.connect().await {
//!         return Ok(());
//!     }
//!
//!     for ont in olt.get_ont_list(None).await? {
//!         println!("{:?} {:?} {:?}", ont.ont_id, ont.serial_number, ont.status);
//!     }
//!
//!     let request = ProvisionRequest::new(OntRef::new(7), "HWTC1A2B3C4D").with_vlan(100);
//!     olt.provision_ont(&request).await?;
//!
//!     olt.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod channel;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod model;
pub mod parser;
pub mod pool;
pub mod session;
pub mod transport;
pub mod vendors;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use adapter::{
    AdapterConfig, AdapterConstructor, AlertThresholds, BatchOutcome, DhcpConfig,
    InterfaceConfig, IpConfig, OltAdapter, OntRef, ProvisionRequest, ProxyTarget, RoutingMode,
    SecureAdapterProxy, ServiceVlan, SpeedLimit, Tr069Config, TriplePlayConfig, VlanConfig,
};
pub use credentials::{CredentialVault, Credentials, EncryptedPassword, EncryptionKey};
pub use error::{Error, ErrorKind, Result, TransportError};
pub use factory::AdapterFactory;
pub use model::{
    AlertRecord, AlertSeverity, GpsLocation, OltDevice, OltInfo, OntLocation, OntRecord, OntState,
    OpticalMetrics, SignalSample,
};
pub use parser::VendorParser;
pub use pool::{AdapterPool, PoolConfig, PooledAdapter};
pub use session::{CommandOptions, CommandResult, SessionState, TransportSession};
pub use transport::{HostKeyVerification, Protocol, SessionConfig};
