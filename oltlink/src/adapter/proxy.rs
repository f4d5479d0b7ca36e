//! Adapter wrapper holding only an encrypted password.

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, warn};

use super::{
    AdapterConfig, AdapterConstructor, AlertThresholds, BatchOutcome, DhcpConfig, InterfaceConfig,
    IpConfig, OltAdapter, OntRef, ProvisionRequest, RoutingMode, SpeedLimit, Tr069Config,
    TriplePlayConfig, VlanConfig,
};
use crate::credentials::{EncryptedPassword, EncryptionKey};
use crate::error::Result;
use crate::model::{AlertRecord, GpsLocation, OltInfo, OntLocation, OntRecord, OpticalMetrics, SignalSample};
use crate::transport::Protocol;

/// Everything about the target OLT except the password.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub vendor: String,
    pub host: String,
    pub username: String,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub protocol: Option<Protocol>,
    pub options: IndexMap<String, String>,
}

impl ProxyTarget {
    pub fn new(vendor: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            host: host.into(),
            username: username.into(),
            port: None,
            model: None,
            protocol: None,
            options: IndexMap::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// An [`OltAdapter`] that keeps the device password encrypted until the
/// real adapter is first needed.
///
/// The password is decrypted once, inside the call that builds the inner
/// adapter; the plaintext then lives only in that adapter's session
/// configuration. Construction failures come back from whichever operation
/// triggered them.
pub struct SecureAdapterProxy {
    constructor: AdapterConstructor,
    target: ProxyTarget,
    password: EncryptedPassword,
    key: EncryptionKey,
    inner: Option<Box<dyn OltAdapter>>,
}

impl SecureAdapterProxy {
    pub fn new(
        constructor: AdapterConstructor,
        target: ProxyTarget,
        password: EncryptedPassword,
        key: EncryptionKey,
    ) -> Self {
        Self {
            constructor,
            target,
            password,
            key,
            inner: None,
        }
    }

    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// Whether the inner adapter has been built.
    pub fn is_built(&self) -> bool {
        self.inner.is_some()
    }

    fn build(&self) -> Result<Box<dyn OltAdapter>> {
        let password = self.key.decrypt(&self.password)?;
        let config = AdapterConfig {
            host: self.target.host.clone(),
            username: self.target.username.clone(),
            password,
            port: self.target.port,
            model: self.target.model.clone(),
            protocol: self.target.protocol,
            options: self.target.options.clone(),
        };
        debug!("Building {} adapter for {}", self.target.vendor, self.target.host);
        (self.constructor)(config)
    }

    /// The inner adapter, built on first use.
    fn adapter(&mut self) -> Result<&mut dyn OltAdapter> {
        let adapter = match self.inner.take() {
            Some(adapter) => adapter,
            None => self.build()?,
        };
        Ok(self.inner.insert(adapter).as_mut())
    }
}

impl fmt::Debug for SecureAdapterProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureAdapterProxy")
            .field("vendor", &self.target.vendor)
            .field("host", &self.target.host)
            .field("username", &self.target.username)
            .field("password", &"[REDACTED]")
            .field("built", &self.inner.is_some())
            .finish()
    }
}

#[async_trait]
impl OltAdapter for SecureAdapterProxy {
    fn vendor(&self) -> &str {
        &self.target.vendor
    }

    fn host(&self) -> &str {
        &self.target.host
    }

    async fn connect(&mut self) -> bool {
        match self.adapter() {
            Ok(adapter) => adapter.connect().await,
            Err(e) => {
                warn!("Cannot build adapter for {}: {}", self.target.host, e);
                false
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(adapter) = self.inner.as_mut() {
            adapter.disconnect().await;
        }
    }

    async fn is_connected(&mut self) -> bool {
        match self.inner.as_mut() {
            Some(adapter) => adapter.is_connected().await,
            None => false,
        }
    }

    async fn get_olt_info(&mut self) -> Result<OltInfo> {
        self.adapter()?.get_olt_info().await
    }

    async fn get_ont_list(&mut self, port: Option<&OntLocation>) -> Result<Vec<OntRecord>> {
        self.adapter()?.get_ont_list(port).await
    }

    async fn provision_ont(&mut self, request: &ProvisionRequest) -> Result<()> {
        self.adapter()?.provision_ont(request).await
    }

    async fn provision_onts_batch(&mut self, requests: &[ProvisionRequest]) -> Vec<BatchOutcome> {
        match self.adapter() {
            Ok(adapter) => adapter.provision_onts_batch(requests).await,
            Err(e) => requests
                .iter()
                .map(|request| BatchOutcome::failed(&request.serial_number, &e))
                .collect(),
        }
    }

    async fn deprovision_ont(&mut self, ont: &OntRef) -> Result<()> {
        self.adapter()?.deprovision_ont(ont).await
    }

    async fn deprovision_onts_batch(&mut self, onts: &[OntRef]) -> Vec<BatchOutcome> {
        match self.adapter() {
            Ok(adapter) => adapter.deprovision_onts_batch(onts).await,
            Err(e) => onts
                .iter()
                .map(|ont| BatchOutcome::failed(ont.to_string(), &e))
                .collect(),
        }
    }

    async fn configure_interface(&mut self, ont: &OntRef, config: &InterfaceConfig) -> Result<()> {
        self.adapter()?.configure_interface(ont, config).await
    }

    async fn configure_vlan(&mut self, config: &VlanConfig) -> Result<()> {
        self.adapter()?.configure_vlan(config).await
    }

    async fn configure_ip(&mut self, ont: &OntRef, config: &IpConfig) -> Result<()> {
        self.adapter()?.configure_ip(ont, config).await
    }

    async fn configure_dhcp(&mut self, ont: &OntRef, config: &DhcpConfig) -> Result<()> {
        self.adapter()?.configure_dhcp(ont, config).await
    }

    async fn configure_tr069(&mut self, ont: &OntRef, config: &Tr069Config) -> Result<()> {
        self.adapter()?.configure_tr069(ont, config).await
    }

    async fn configure_triple_play(&mut self, ont: &OntRef, config: &TriplePlayConfig) -> Result<()> {
        self.adapter()?.configure_triple_play(ont, config).await
    }

    async fn configure_routing_mode(&mut self, ont: &OntRef, mode: RoutingMode) -> Result<()> {
        self.adapter()?.configure_routing_mode(ont, mode).await
    }

    async fn enable_port(&mut self, port: &OntLocation) -> Result<()> {
        self.adapter()?.enable_port(port).await
    }

    async fn disable_port(&mut self, port: &OntLocation) -> Result<()> {
        self.adapter()?.disable_port(port).await
    }

    async fn reboot_ont(&mut self, ont: &OntRef) -> Result<()> {
        self.adapter()?.reboot_ont(ont).await
    }

    async fn factory_reset_ont(&mut self, ont: &OntRef) -> Result<()> {
        self.adapter()?.factory_reset_ont(ont).await
    }

    async fn get_ont_status(&mut self, ont: &OntRef) -> Result<OntRecord> {
        self.adapter()?.get_ont_status(ont).await
    }

    async fn get_ont_metrics(&mut self, ont: &OntRef) -> Result<OpticalMetrics> {
        self.adapter()?.get_ont_metrics(ont).await
    }

    async fn get_ont_signal_history(&mut self, ont: &OntRef) -> Result<Vec<SignalSample>> {
        self.adapter()?.get_ont_signal_history(ont).await
    }

    async fn get_ont_alerts(&mut self, ont: &OntRef) -> Result<Vec<AlertRecord>> {
        self.adapter()?.get_ont_alerts(ont).await
    }

    async fn configure_alert_thresholds(&mut self, ont: &OntRef, thresholds: &AlertThresholds) -> Result<()> {
        self.adapter()?.configure_alert_thresholds(ont, thresholds).await
    }

    async fn get_ont_gps(&mut self, ont: &OntRef) -> Result<Option<GpsLocation>> {
        self.adapter()?.get_ont_gps(ont).await
    }

    async fn set_ont_gps(&mut self, ont: &OntRef, location: &GpsLocation) -> Result<()> {
        self.adapter()?.set_ont_gps(ont, location).await
    }

    async fn configure_speed_limit(&mut self, ont: &OntRef, limit: &SpeedLimit) -> Result<()> {
        self.adapter()?.configure_speed_limit(ont, limit).await
    }

    async fn execute_custom_command(&mut self, command: &str) -> Result<String> {
        self.adapter()?.execute_custom_command(command).await
    }
}
