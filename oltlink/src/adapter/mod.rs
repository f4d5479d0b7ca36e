//! Vendor-agnostic OLT operations.
//!
//! [`OltAdapter`] is the contract every vendor implements. Callers hold a
//! `Box<dyn OltAdapter>` from the [`AdapterFactory`](crate::AdapterFactory)
//! and never see vendor command syntax.

mod proxy;
mod request;

pub use proxy::{ProxyTarget, SecureAdapterProxy};
pub use request::{
    AlertThresholds, BatchOutcome, DhcpConfig, InterfaceConfig, IpConfig, OntRef,
    ProvisionRequest, RoutingMode, ServiceVlan, SpeedLimit, Tr069Config, TriplePlayConfig,
    VlanConfig,
};
pub(crate) use request::check_cli_word;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::warn;
use secrecy::SecretString;

use crate::error::{Error, Result};
use crate::model::{AlertRecord, GpsLocation, OltInfo, OntLocation, OntRecord, OpticalMetrics, SignalSample};
use crate::parser::VendorParser;
use crate::transport::{HostKeyVerification, Protocol, SessionConfig};

/// Builds a disconnected adapter from its configuration.
pub type AdapterConstructor = Arc<dyn Fn(AdapterConfig) -> Result<Box<dyn OltAdapter>> + Send + Sync>;

/// Everything needed to build an adapter for one OLT.
///
/// `options` carries vendor-specific settings (default PON location) and
/// session tuning:
///
/// | key | meaning |
/// |---|---|
/// | `timeout` | connect/login timeout, seconds |
/// | `command_timeout` | per-command upper bound, seconds |
/// | `command_delay_ms` | fixed delay before draining output |
/// | `host_key_verification` | `strict`, `accept-new` or `disabled` |
/// | `known_hosts` | known_hosts file path |
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub protocol: Option<Protocol>,
    pub options: IndexMap<String, String>,
}

impl AdapterConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
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

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Fill in protocol and port where the caller left them open.
    pub fn with_defaults(mut self, protocol: Protocol) -> Self {
        let protocol = *self.protocol.get_or_insert(protocol);
        self.port.get_or_insert(protocol.default_port());
        self
    }

    /// Session configuration for this OLT. `setup` is the vendor's
    /// post-login command list.
    pub fn session_config(&self, default_protocol: Protocol, setup: &[&str]) -> Result<SessionConfig> {
        let protocol = self.protocol.unwrap_or(default_protocol);
        let mut config = SessionConfig::new(&self.host, &self.username, self.password.clone())
            .with_protocol(protocol)
            .with_port(self.port.unwrap_or(protocol.default_port()));

        if let Some(seconds) = self.parse_option::<u64>("timeout")? {
            config = config.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(seconds) = self.parse_option::<u64>("command_timeout")? {
            config.command_timeout = Duration::from_secs(seconds);
        }
        if let Some(millis) = self.parse_option::<u64>("command_delay_ms")? {
            config.command_delay = Duration::from_millis(millis);
        }
        if let Some(mode) = self.option("host_key_verification") {
            let mode = match mode.to_ascii_lowercase().as_str() {
                "strict" => HostKeyVerification::Strict,
                "accept-new" | "accept_new" => HostKeyVerification::AcceptNew,
                "disabled" | "off" => HostKeyVerification::Disabled,
                other => {
                    return Err(Error::configuration(format!(
                        "unknown host_key_verification {:?}",
                        other
                    )));
                }
            };
            config = config.with_host_key_verification(mode);
        }
        if let Some(path) = self.option("known_hosts") {
            config = config.with_known_hosts_path(path);
        }
        for command in setup {
            config = config.with_on_open_command(*command);
        }
        Ok(config)
    }

    /// Parse a vendor option, `None` when it is not set.
    pub fn parse_option<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.option(key) {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| {
                Error::configuration(format!("option {} has invalid value {:?}", key, value))
            }),
        }
    }
}

/// The operations every vendor adapter supports.
///
/// Adapters own their session, so every operation takes `&mut self`; to
/// run operations against one OLT concurrently, check adapters out of an
/// [`AdapterPool`](crate::AdapterPool).
///
/// Errors: transport failures that survive the session's single retry come
/// back as [`Error::Connection`] or [`Error::Command`]. A failure message
/// printed by the device becomes [`Error::NotFound`] when it names a
/// missing object, [`Error::Provisioning`] for (de)provisioning,
/// [`Error::Configuration`] for configuration changes and
/// [`Error::Command`] otherwise.
#[async_trait]
pub trait OltAdapter: Send {
    /// Registered vendor name (`huawei`, `zte`).
    fn vendor(&self) -> &str;

    fn host(&self) -> &str;

    /// Open the CLI session. Failures are logged and reported as `false`.
    async fn connect(&mut self) -> bool;

    async fn disconnect(&mut self);

    /// Liveness probe; see [`TransportSession::is_connected`](crate::TransportSession::is_connected).
    async fn is_connected(&mut self) -> bool;

    async fn get_olt_info(&mut self) -> Result<OltInfo>;

    /// ONTs on one PON port, or on every port when `port` is `None`.
    async fn get_ont_list(&mut self, port: Option<&OntLocation>) -> Result<Vec<OntRecord>>;

    async fn provision_ont(&mut self, request: &ProvisionRequest) -> Result<()>;

    /// Provision in order over this adapter's session, continuing past
    /// failures.
    async fn provision_onts_batch(&mut self, requests: &[ProvisionRequest]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.provision_ont(request).await;
            if let Err(ref e) = result {
                warn!("Provisioning {} on {} failed: {}", request.serial_number, self.host(), e);
            }
            outcomes.push(BatchOutcome::from_result(&request.serial_number, &result));
        }
        outcomes
    }

    async fn deprovision_ont(&mut self, ont: &OntRef) -> Result<()>;

    async fn deprovision_onts_batch(&mut self, onts: &[OntRef]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(onts.len());
        for ont in onts {
            let result = self.deprovision_ont(ont).await;
            if let Err(ref e) = result {
                warn!("Deprovisioning {} on {} failed: {}", ont, self.host(), e);
            }
            outcomes.push(BatchOutcome::from_result(ont.to_string(), &result));
        }
        outcomes
    }

    async fn configure_interface(&mut self, ont: &OntRef, config: &InterfaceConfig) -> Result<()>;

    async fn configure_vlan(&mut self, config: &VlanConfig) -> Result<()>;

    async fn configure_ip(&mut self, ont: &OntRef, config: &IpConfig) -> Result<()>;

    async fn configure_dhcp(&mut self, ont: &OntRef, config: &DhcpConfig) -> Result<()>;

    async fn configure_tr069(&mut self, ont: &OntRef, config: &Tr069Config) -> Result<()>;

    async fn configure_triple_play(&mut self, ont: &OntRef, config: &TriplePlayConfig) -> Result<()>;

    async fn configure_routing_mode(&mut self, ont: &OntRef, mode: RoutingMode) -> Result<()>;

    /// Administratively enable a PON port.
    async fn enable_port(&mut self, port: &OntLocation) -> Result<()>;

    async fn disable_port(&mut self, port: &OntLocation) -> Result<()>;

    async fn reboot_ont(&mut self, ont: &OntRef) -> Result<()>;

    async fn factory_reset_ont(&mut self, ont: &OntRef) -> Result<()>;

    async fn get_ont_status(&mut self, ont: &OntRef) -> Result<OntRecord>;

    /// Optical readings. An offline ONT reports every field as `None`.
    async fn get_ont_metrics(&mut self, ont: &OntRef) -> Result<OpticalMetrics>;

    async fn get_ont_signal_history(&mut self, ont: &OntRef) -> Result<Vec<SignalSample>>;

    async fn get_ont_alerts(&mut self, ont: &OntRef) -> Result<Vec<AlertRecord>>;

    async fn configure_alert_thresholds(&mut self, ont: &OntRef, thresholds: &AlertThresholds) -> Result<()>;

    /// The ONT's registered location, `None` if the OLT has none on file.
    async fn get_ont_gps(&mut self, ont: &OntRef) -> Result<Option<GpsLocation>>;

    async fn set_ont_gps(&mut self, ont: &OntRef, location: &GpsLocation) -> Result<()>;

    async fn configure_speed_limit(&mut self, ont: &OntRef, limit: &SpeedLimit) -> Result<()>;

    /// Send any CLI command and return its raw output.
    async fn execute_custom_command(&mut self, command: &str) -> Result<String>;
}

/// What an operation does, for mapping device failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Command,
    Provisioning,
    Configuration,
}

const NOT_FOUND_MARKERS: &[&str] = &["does not exist", "not exist", "no such", "is not configured"];

/// Map a failure message the device printed onto the error taxonomy.
pub(crate) fn check_output(
    parser: &dyn VendorParser,
    operation: Operation,
    command: &str,
    output: &str,
) -> Result<()> {
    let Some(message) = parser.detect_failure(output) else {
        return Ok(());
    };

    let lowered = message.to_ascii_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(Error::not_found(format!("{} ({})", message, command)));
    }

    Err(match operation {
        Operation::Provisioning => Error::provisioning(format!("{}: {}", command, message)),
        Operation::Configuration => Error::configuration(format!("{}: {}", command, message)),
        Operation::Command => Error::command(command, message),
    })
}

/// Check each output of a command batch, in order.
pub(crate) fn check_outputs<S: AsRef<str>>(
    parser: &dyn VendorParser,
    operation: Operation,
    commands: &[S],
    outputs: &[String],
) -> Result<()> {
    for (command, output) in commands.iter().zip(outputs) {
        check_output(parser, operation, command.as_ref(), output)?;
    }
    Ok(())
}
