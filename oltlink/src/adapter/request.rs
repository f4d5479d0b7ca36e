//! Inputs to adapter operations.
//!
//! Requests validate what can be checked without a device (ranges,
//! required fields); the device has the last word on the rest.

use std::net::Ipv4Addr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::model::OntLocation;

/// Addresses one ONT. `location` falls back to the adapter's default PON
/// port when absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OntRef {
    pub ont_id: u32,
    #[serde(default)]
    pub location: Option<OntLocation>,
}

impl OntRef {
    pub fn new(ont_id: u32) -> Self {
        Self {
            ont_id,
            location: None,
        }
    }

    pub fn at(ont_id: u32, location: OntLocation) -> Self {
        Self {
            ont_id,
            location: Some(location),
        }
    }
}

impl std::fmt::Display for OntRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(ref location) => write!(f, "ONT {} on {}", self.ont_id, location),
            None => write!(f, "ONT {}", self.ont_id),
        }
    }
}

/// Register a new ONT by serial number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub ont: OntRef,
    pub serial_number: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Vendor equipment type (ZTE requires one, e.g. `ZTE-F660`).
    #[serde(default)]
    pub ont_type: Option<String>,
    #[serde(default)]
    pub line_profile: Option<u32>,
    #[serde(default)]
    pub service_profile: Option<u32>,
    /// Service VLAN to bind right away, if any.
    #[serde(default)]
    pub vlan: Option<u16>,
}

impl ProvisionRequest {
    pub fn new(ont: OntRef, serial_number: impl Into<String>) -> Self {
        Self {
            ont,
            serial_number: serial_number.into(),
            description: None,
            ont_type: None,
            line_profile: None,
            service_profile: None,
            vlan: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_ont_type(mut self, ont_type: impl Into<String>) -> Self {
        self.ont_type = Some(ont_type.into());
        self
    }

    pub fn with_profiles(mut self, line_profile: u32, service_profile: u32) -> Self {
        self.line_profile = Some(line_profile);
        self.service_profile = Some(service_profile);
        self
    }

    pub fn with_vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    /// Serial numbers are either 16 hex digits or a 4-letter vendor code
    /// followed by 8 hex digits (`HWTC1A2B3C4D`).
    pub fn validate(&self) -> Result<()> {
        let serial = self.serial_number.trim();
        let hex = |s: &str| s.chars().all(|c| c.is_ascii_hexdigit());
        let valid = match serial.len() {
            16 => hex(serial),
            12 => serial.is_char_boundary(4)
                && serial[..4].chars().all(|c| c.is_ascii_alphanumeric())
                && hex(&serial[4..]),
            _ => false,
        };
        if !valid {
            return Err(Error::provisioning(format!(
                "invalid ONT serial number {:?}",
                self.serial_number
            )));
        }
        if let Some(vlan) = self.vlan {
            check_vlan(vlan).map_err(|e| Error::provisioning(e.to_string()))?;
        }
        let text = self
            .description
            .as_deref()
            .map_or(Ok(()), |d| check_cli_text("ONT description", d));
        let word = self
            .ont_type
            .as_deref()
            .map_or(Ok(()), |t| check_cli_word("ONT type", t));
        text.and(word).map_err(|e| Error::provisioning(e.to_string()))
    }
}

/// An OLT VLAN and its uplink binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanConfig {
    pub vlan_id: u16,
    #[serde(default)]
    pub name: Option<String>,
    /// Uplink port in the vendor's notation (`0/9/0`, `gei_1/21/1`).
    #[serde(default)]
    pub uplink_port: Option<String>,
}

impl VlanConfig {
    pub fn new(vlan_id: u16) -> Self {
        Self {
            vlan_id,
            name: None,
            uplink_port: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_uplink(mut self, port: impl Into<String>) -> Self {
        self.uplink_port = Some(port.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_vlan(self.vlan_id)?;
        if let Some(ref name) = self.name {
            check_cli_text("VLAN name", name)?;
        }
        if let Some(ref uplink) = self.uplink_port {
            check_cli_word("uplink port", uplink)?;
        }
        Ok(())
    }
}

/// Ethernet (UNI) port settings on an ONT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// 1-based ONT Ethernet port.
    pub eth_port: u8,
    #[serde(default)]
    pub native_vlan: Option<u16>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl InterfaceConfig {
    pub fn new(eth_port: u8) -> Self {
        Self {
            eth_port,
            native_vlan: None,
            enabled: None,
        }
    }

    pub fn with_native_vlan(mut self, vlan: u16) -> Self {
        self.native_vlan = Some(vlan);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.eth_port == 0 {
            return Err(Error::configuration("ONT Ethernet ports are numbered from 1"));
        }
        if self.native_vlan.is_none() && self.enabled.is_none() {
            return Err(Error::configuration("interface config changes nothing"));
        }
        if let Some(vlan) = self.native_vlan {
            check_vlan(vlan)?;
        }
        Ok(())
    }
}

/// Static IPv4 addressing for the ONT's WAN/management interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub vlan: u16,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
}

impl IpConfig {
    pub fn new(address: Ipv4Addr, netmask: Ipv4Addr, gateway: Ipv4Addr, vlan: u16) -> Self {
        Self {
            address,
            netmask,
            gateway,
            vlan,
            dns: Vec::new(),
        }
    }

    pub fn with_dns(mut self, server: Ipv4Addr) -> Self {
        self.dns.push(server);
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_vlan(self.vlan)?;
        let mask = u32::from(self.netmask);
        if mask.leading_ones() + mask.trailing_zeros() != 32 {
            return Err(Error::configuration(format!("{} is not a netmask", self.netmask)));
        }
        if self.address.is_unspecified() || self.address.is_broadcast() {
            return Err(Error::configuration(format!("{} is not a host address", self.address)));
        }
        Ok(())
    }
}

/// DHCP addressing for the ONT's WAN/management interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpConfig {
    pub vlan: u16,
    /// 802.1p priority, 0-7.
    #[serde(default)]
    pub priority: Option<u8>,
}

impl DhcpConfig {
    pub fn new(vlan: u16) -> Self {
        Self {
            vlan,
            priority: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_vlan(self.vlan)?;
        if self.priority.is_some_and(|p| p > 7) {
            return Err(Error::configuration("802.1p priority must be 0-7"));
        }
        Ok(())
    }
}

/// ACS binding for TR-069 management.
#[derive(Debug, Clone)]
pub struct Tr069Config {
    pub acs_url: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Seconds between periodic informs.
    pub inform_interval: Option<u32>,
    /// Vendor-side ACS profile to create or update.
    pub profile_id: u32,
}

impl Tr069Config {
    pub fn new(acs_url: impl Into<String>) -> Self {
        Self {
            acs_url: acs_url.into(),
            username: None,
            password: None,
            inform_interval: None,
            profile_id: 1,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    pub fn with_inform_interval(mut self, seconds: u32) -> Self {
        self.inform_interval = Some(seconds);
        self
    }

    pub fn with_profile_id(mut self, profile_id: u32) -> Self {
        self.profile_id = profile_id;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.acs_url.trim();
        let scheme_ok = url.starts_with("http://") || url.starts_with("https://");
        if !scheme_ok || check_cli_word("ACS URL", url).is_err() {
            return Err(Error::configuration(format!("invalid ACS URL {:?}", self.acs_url)));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                check_cli_word("ACS username", username)?;
                check_cli_word("ACS password", password.expose_secret())
            }
            (None, None) => Ok(()),
            _ => Err(Error::configuration("ACS username and password go together")),
        }
    }
}

/// One service on an ONT: which OLT VLAN and GEM port carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVlan {
    pub vlan: u16,
    pub gemport: u16,
    /// VLAN seen on the customer side; defaults to `vlan`.
    #[serde(default)]
    pub user_vlan: Option<u16>,
}

impl ServiceVlan {
    pub fn new(vlan: u16, gemport: u16) -> Self {
        Self {
            vlan,
            gemport,
            user_vlan: None,
        }
    }

    pub fn user_vlan(&self) -> u16 {
        self.user_vlan.unwrap_or(self.vlan)
    }
}

/// Internet, VoIP and IPTV service bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriplePlayConfig {
    #[serde(default)]
    pub internet: Option<ServiceVlan>,
    #[serde(default)]
    pub voip: Option<ServiceVlan>,
    #[serde(default)]
    pub iptv: Option<ServiceVlan>,
}

impl TriplePlayConfig {
    /// Configured services in a fixed order, with their names.
    pub fn services(&self) -> Vec<(&'static str, ServiceVlan)> {
        [("internet", self.internet), ("voip", self.voip), ("iptv", self.iptv)]
            .into_iter()
            .filter_map(|(name, service)| service.map(|s| (name, s)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let services = self.services();
        if services.is_empty() {
            return Err(Error::configuration("triple play config names no service"));
        }
        for (_, service) in services {
            check_vlan(service.vlan)?;
            check_vlan(service.user_vlan())?;
        }
        Ok(())
    }
}

/// WAN mode of an ONT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Bridge,
    Route,
}

/// Optical alarm thresholds. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default)]
    pub rx_power_low: Option<f64>,
    #[serde(default)]
    pub rx_power_high: Option<f64>,
    #[serde(default)]
    pub tx_power_low: Option<f64>,
    #[serde(default)]
    pub tx_power_high: Option<f64>,
    #[serde(default)]
    pub temperature_high: Option<f64>,
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        if *self == AlertThresholds::default() {
            return Err(Error::configuration("no alert threshold given"));
        }
        let pairs = [
            ("rx power", self.rx_power_low, self.rx_power_high),
            ("tx power", self.tx_power_low, self.tx_power_high),
        ];
        for (name, low, high) in pairs {
            if let (Some(low), Some(high)) = (low, high) {
                if low >= high {
                    return Err(Error::configuration(format!(
                        "{} threshold low {} is not below high {}",
                        name, low, high
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Rate limits in kbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedLimit {
    pub upstream_kbps: u32,
    pub downstream_kbps: u32,
}

impl SpeedLimit {
    pub fn new(upstream_kbps: u32, downstream_kbps: u32) -> Self {
        Self {
            upstream_kbps,
            downstream_kbps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream_kbps == 0 || self.downstream_kbps == 0 {
            return Err(Error::configuration("speed limits must be positive"));
        }
        Ok(())
    }
}

/// Per-item result of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// What the item was (serial number or ONT reference).
    pub item: String,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
}

impl BatchOutcome {
    pub fn succeeded(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            success: true,
            error_kind: None,
            message: None,
        }
    }

    pub fn failed(item: impl Into<String>, error: &Error) -> Self {
        Self {
            item: item.into(),
            success: false,
            error_kind: Some(error.kind()),
            message: Some(error.to_string()),
        }
    }

    pub(crate) fn from_result(item: impl Into<String>, result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::succeeded(item),
            Err(e) => Self::failed(item, e),
        }
    }
}

fn check_vlan(vlan: u16) -> Result<()> {
    if (1..=4094).contains(&vlan) {
        Ok(())
    } else {
        Err(Error::configuration(format!("VLAN {} out of range 1-4094", vlan)))
    }
}

/// Text spliced into a command line. A line break would end the command and
/// start another one; a quote would close the argument it sits in.
pub(crate) fn check_cli_text(field: &str, value: &str) -> Result<()> {
    match value.chars().find(|&c| c.is_control() || c == '"') {
        Some(c) => Err(Error::configuration(format!("{} may not contain {:?}", field, c))),
        None => Ok(()),
    }
}

/// Like [`check_cli_text`], for values passed as one unquoted argument.
pub(crate) fn check_cli_word(field: &str, value: &str) -> Result<()> {
    check_cli_text(field, value)?;
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(Error::configuration(format!("{} must be a single word", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_number_formats() {
        let ont = OntRef::new(1);
        assert!(ProvisionRequest::new(ont.clone(), "485754431A2B3C4D").validate().is_ok());
        assert!(ProvisionRequest::new(ont.clone(), "HWTC1A2B3C4D").validate().is_ok());
        assert!(ProvisionRequest::new(ont.clone(), "ZTEGC0FFEE00").validate().is_ok());

        let err = ProvisionRequest::new(ont.clone(), "HWTC-1A2B").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provisioning);
        let err = ProvisionRequest::new(ont, "HWTC1A2B3C4D")
            .with_description("a \"quoted\" name")
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provisioning);
    }

    #[test]
    fn test_line_breaks_never_reach_the_cli() {
        let request = |description: &str| {
            ProvisionRequest::new(OntRef::new(3), "HWTC1A2B3C4D").with_description(description)
        };
        assert!(request("CUST-1001 floor 2").validate().is_ok());
        for bad in ["CUST\r\nundo service-port all", "CUST\nquit", "tab\there", "bell\u{7}"] {
            let err = request(bad).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Provisioning, "{:?}", bad);
        }

        let typed = |ont_type: &str| {
            ProvisionRequest::new(OntRef::new(3), "ZTEGC0FFEE03").with_ont_type(ont_type)
        };
        assert!(typed("ZTE-F660").validate().is_ok());
        assert!(typed("ZTE-F660\nno onu 1").validate().is_err());
        assert!(typed("ZTE-F660 sn X").validate().is_err());

        assert!(VlanConfig::new(100).with_name("internet access").validate().is_ok());
        assert!(VlanConfig::new(100).with_name("x\r\nundo vlan 100").validate().is_err());
        assert!(VlanConfig::new(100).with_name("x\" \"y").validate().is_err());
        assert!(VlanConfig::new(100).with_uplink("0/9/0").validate().is_ok());
        assert!(VlanConfig::new(100).with_uplink("gei_1/21/1\nend").validate().is_err());
    }

    #[test]
    fn test_tr069_credentials_are_single_words() {
        let config = |user: &str, password: &str| {
            Tr069Config::new("http://acs.example.net:7547/")
                .with_credentials(user, SecretString::from(password.to_string()))
        };
        assert!(config("cpe", "s3cret!").validate().is_ok());
        assert!(config("cpe\nundo ont", "s3cret").validate().is_err());
        assert!(config("cpe", "s3cret\r\nquit").validate().is_err());
        assert!(config("cpe", "two words").validate().is_err());
        assert!(config("cpe", "a\"b").validate().is_err());

        let err = config("cpe", "hunter2\n").validate().unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert!(Tr069Config::new("http://acs/\x00").validate().is_err());
    }

    #[test]
    fn test_vlan_range() {
        assert!(VlanConfig::new(1).validate().is_ok());
        assert!(VlanConfig::new(4094).validate().is_ok());
        assert_eq!(
            VlanConfig::new(0).validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert!(VlanConfig::new(4095).validate().is_err());
    }

    #[test]
    fn test_ip_config_checks_netmask() {
        let ip = |mask: [u8; 4]| {
            IpConfig::new(
                Ipv4Addr::new(10, 1, 2, 3),
                Ipv4Addr::from(mask),
                Ipv4Addr::new(10, 1, 2, 1),
                200,
            )
        };
        assert!(ip([255, 255, 255, 0]).validate().is_ok());
        assert!(ip([255, 255, 0, 255]).validate().is_err());
    }

    #[test]
    fn test_thresholds_need_one_value() {
        assert!(AlertThresholds::default().validate().is_err());

        let thresholds = AlertThresholds {
            rx_power_low: Some(-27.0),
            ..Default::default()
        };
        assert!(thresholds.validate().is_ok());

        let inverted = AlertThresholds {
            rx_power_low: Some(-8.0),
            rx_power_high: Some(-27.0),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_triple_play_needs_a_service() {
        assert!(TriplePlayConfig::default().validate().is_err());

        let config = TriplePlayConfig {
            internet: Some(ServiceVlan::new(100, 1)),
            iptv: Some(ServiceVlan::new(300, 3)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        let names: Vec<_> = config.services().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["internet", "iptv"]);
    }

    #[test]
    fn test_tr069_url_and_credentials() {
        assert!(Tr069Config::new("http://acs.example.net:7547/").validate().is_ok());
        assert!(Tr069Config::new("acs.example.net").validate().is_err());

        let mut config = Tr069Config::new("https://acs.example.net/");
        config.username = Some("cpe".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_outcome_serializes_kind() {
        let outcome = BatchOutcome::failed("HWTC1A2B3C4D", &Error::provisioning("SN already exists"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_kind"], "provisioning");
    }
}
