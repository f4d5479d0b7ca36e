//! ZTE ZXA10 C300/C320/C600 command templates.
//!
//! Registration and port state live under `interface gpon-olt_S/L/P`,
//! per-ONU service ports under `interface gpon-onu_S/L/P:N`, and ONU-side
//! settings (WAN, TR-069, Ethernet ports) under `pon-onu-mng gpon-onu_S/L/P:N`.

use std::fmt;
use std::str::FromStr;

use crate::adapter::{
    AlertThresholds, DhcpConfig, InterfaceConfig, IpConfig, RoutingMode, ServiceVlan, SpeedLimit,
    Tr069Config,
};
use crate::error::{Error, Result};
use crate::model::GpsLocation;

/// A GPON port as `shelf/slot/port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GponIndex {
    pub shelf: u16,
    pub slot: u16,
    pub port: u16,
}

impl GponIndex {
    pub fn new(shelf: u16, slot: u16, port: u16) -> Self {
        Self { shelf, slot, port }
    }
}

impl Default for GponIndex {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for GponIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.shelf, self.slot, self.port)
    }
}

impl FromStr for GponIndex {
    type Err = Error;

    /// Accepts `1/2/3` and `gpon-olt_1/2/3`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::configuration(format!("{:?} is not a shelf/slot/port GPON index", s));
        let trimmed = s.trim();
        let index = trimmed.strip_prefix("gpon-olt_").unwrap_or(trimmed);

        let parts: Vec<u16> = index
            .split('/')
            .map(|part| part.parse::<u16>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid())?;
        match parts[..] {
            [shelf, slot, port] => Ok(Self::new(shelf, slot, port)),
            _ => Err(invalid()),
        }
    }
}

/// `gpon-onu_1/1/1:3`
pub fn onu_name(index: &GponIndex, onu_id: u32) -> String {
    format!("gpon-onu_{}:{}", index, onu_id)
}

pub fn olt_interface(index: &GponIndex) -> String {
    format!("interface gpon-olt_{}", index)
}

pub fn onu_interface(index: &GponIndex, onu_id: u32) -> String {
    format!("interface {}", onu_name(index, onu_id))
}

/// Enter ONU-side management of one ONU.
pub fn onu_management(index: &GponIndex, onu_id: u32) -> String {
    format!("pon-onu-mng {}", onu_name(index, onu_id))
}

pub fn show_system() -> String {
    "show system-group".to_string()
}

/// ONUs on one port, or on every port.
pub fn show_onu_list(index: Option<&GponIndex>) -> String {
    match index {
        Some(index) => format!("show gpon onu baseinfo gpon-olt_{}", index),
        None => "show gpon onu baseinfo".to_string(),
    }
}

pub fn show_onu_detail(index: &GponIndex, onu_id: u32) -> String {
    format!("show gpon onu detail-info {}", onu_name(index, onu_id))
}

/// ONU-side transceiver readings.
pub fn show_onu_optical(index: &GponIndex, onu_id: u32) -> String {
    format!("show gpon remote-onu interface pon {}", onu_name(index, onu_id))
}

/// Both directions of the link as seen by OLT and ONU.
pub fn show_attenuation(index: &GponIndex, onu_id: u32) -> String {
    format!("show pon power attenuation {}", onu_name(index, onu_id))
}

pub fn show_power_history(index: &GponIndex, onu_id: u32) -> String {
    format!("show pon power onu-history {}", onu_name(index, onu_id))
}

pub fn show_alarms(index: &GponIndex, onu_id: u32) -> String {
    format!("show alarm current {}", onu_name(index, onu_id))
}

/// Register an ONU. Runs inside [`olt_interface`].
pub fn onu_add(onu_id: u32, onu_type: &str, serial: &str) -> String {
    format!("onu {} type {} sn {}", onu_id, onu_type, serial)
}

/// Runs inside [`olt_interface`].
pub fn onu_remove(onu_id: u32) -> String {
    format!("no onu {}", onu_id)
}

/// Runs inside [`onu_interface`].
pub fn description(text: &str) -> String {
    format!("description {}", text)
}

/// Serial number in the `ZTEGC0FFEE01` form the CLI takes. A 16-digit hex
/// serial whose first 8 digits spell a vendor code is converted back.
pub fn serial_vendor_form(serial: &str) -> String {
    let serial = serial.trim().to_ascii_uppercase();
    if serial.len() != 16 || !serial.is_char_boundary(8) {
        return serial;
    }

    let (vendor_hex, rest) = serial.split_at(8);
    let vendor: Option<String> = (0..4)
        .map(|i| {
            u8::from_str_radix(&vendor_hex[i * 2..i * 2 + 2], 16)
                .ok()
                .filter(u8::is_ascii_alphanumeric)
                .map(char::from)
        })
        .collect();
    match vendor {
        Some(vendor) => format!("{}{}", vendor, rest),
        None => serial,
    }
}

/// Service port binding, `number` counting from 1. Runs inside
/// [`onu_interface`].
pub fn service_port(number: usize, service: &ServiceVlan) -> String {
    format!(
        "service-port {} vport {} user-vlan {} vlan {}",
        number,
        service.gemport,
        service.user_vlan(),
        service.vlan
    )
}

/// ONU-side service mapping. Runs inside [`onu_management`].
pub fn service(name: &str, service: &ServiceVlan) -> String {
    format!("service {} gemport {} vlan {}", name, service.gemport, service.vlan)
}

/// VLAN creation and optional uplink tagging, in global config.
pub fn vlan(vlan_id: u16, name: Option<&str>, uplink: Option<&str>) -> Result<Vec<String>> {
    let mut commands = vec![format!("vlan {}", vlan_id)];
    if let Some(name) = name {
        if name.chars().any(char::is_whitespace) {
            return Err(Error::configuration(format!(
                "ZTE VLAN names may not contain spaces: {:?}",
                name
            )));
        }
        commands.push(format!("name {}", name));
    }
    commands.push("exit".to_string());

    if let Some(uplink) = uplink {
        let interface = if uplink.contains('_') {
            uplink.to_string()
        } else {
            // bare `1/21/1` is a gigabit uplink
            GponIndex::from_str(uplink)?;
            format!("gei_{}", uplink)
        };
        commands.push(format!("interface {}", interface));
        commands.push(format!("switchport vlan {} tag", vlan_id));
        commands.push("exit".to_string());
    }
    Ok(commands)
}

/// Ethernet port settings. Runs inside [`onu_management`].
pub fn eth_port_settings(config: &InterfaceConfig) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(vlan) = config.native_vlan {
        commands.push(format!(
            "vlan port eth_0/{} mode tag vlan {}",
            config.eth_port, vlan
        ));
    }
    if let Some(enabled) = config.enabled {
        commands.push(format!(
            "interface eth eth_0/{} state {}",
            config.eth_port,
            if enabled { "unlock" } else { "lock" }
        ));
    }
    commands
}

/// Runs inside [`onu_management`].
pub fn wan_static(config: &IpConfig) -> String {
    let mut command = format!(
        "wan-ip 1 mode static ip-address {} mask {} gateway {} vlan {}",
        config.address, config.netmask, config.gateway, config.vlan
    );
    if let Some(primary) = config.dns.first() {
        command.push_str(&format!(" primary-dns {}", primary));
    }
    if let Some(secondary) = config.dns.get(1) {
        command.push_str(&format!(" second-dns {}", secondary));
    }
    command
}

/// Runs inside [`onu_management`].
pub fn wan_dhcp(config: &DhcpConfig) -> String {
    format!(
        "wan-ip 1 mode dhcp vlan {} priority {}",
        config.vlan,
        config.priority.unwrap_or(0)
    )
}

/// TR-069 management commands. Runs inside [`onu_management`]; the ACS
/// line carries the password when one is set.
pub fn tr069(config: &Tr069Config, password: Option<&str>) -> Vec<String> {
    let mut acs = format!("tr069-mgmt 1 acs {}", config.acs_url);
    if let (Some(user), Some(password)) = (config.username.as_deref(), password) {
        acs.push_str(&format!(" validate basic username {} password {}", user, password));
    }

    let mut commands = vec!["tr069-mgmt 1 state unlock".to_string(), acs];
    if let Some(interval) = config.inform_interval {
        commands.push(format!("tr069-mgmt 1 inform-interval enable interval {}", interval));
    }
    commands
}

/// Runs inside [`onu_management`].
pub fn wan_mode(mode: RoutingMode) -> String {
    match mode {
        RoutingMode::Route => "wan 1 mode route".to_string(),
        RoutingMode::Bridge => "wan 1 mode bridge".to_string(),
    }
}

/// Runs inside [`olt_interface`].
pub fn port_admin(enabled: bool) -> String {
    let command = if enabled { "no shutdown" } else { "shutdown" };
    command.to_string()
}

/// Runs inside [`onu_management`]; asks `[yes/no]`.
pub fn reboot() -> String {
    "reboot".to_string()
}

/// Runs inside [`onu_management`]; asks `[yes/no]`.
pub fn restore_factory() -> String {
    "restore factory".to_string()
}

/// Runs inside [`onu_management`].
pub fn alarm_thresholds(thresholds: &AlertThresholds) -> String {
    let mut command = "alarm optical-threshold".to_string();
    let limits = [
        ("rx-lower", thresholds.rx_power_low),
        ("rx-upper", thresholds.rx_power_high),
        ("tx-lower", thresholds.tx_power_low),
        ("tx-upper", thresholds.tx_power_high),
        ("temp-upper", thresholds.temperature_high),
    ];
    for (keyword, value) in limits {
        if let Some(value) = value {
            command.push_str(&format!(" {} {}", keyword, value));
        }
    }
    command
}

/// Runs inside [`onu_management`].
pub fn location(location: &GpsLocation) -> String {
    let mut command = format!(
        "location longitude {} latitude {}",
        location.longitude, location.latitude
    );
    if let Some(altitude) = location.altitude {
        command.push_str(&format!(" altitude {}", altitude));
    }
    command
}

/// Runs inside [`onu_interface`].
pub fn traffic_limit(gemport: u16, limit: &SpeedLimit) -> String {
    format!(
        "gemport {} traffic-limit upstream {} downstream {}",
        gemport, limit.upstream_kbps, limit.downstream_kbps
    )
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use secrecy::SecretString;

    use super::*;

    const INDEX: GponIndex = GponIndex {
        shelf: 1,
        slot: 2,
        port: 3,
    };

    #[test]
    fn test_gpon_index_parsing() {
        assert_eq!("1/2/3".parse::<GponIndex>().unwrap(), INDEX);
        assert_eq!("gpon-olt_1/2/3".parse::<GponIndex>().unwrap(), INDEX);
        assert!("1/2".parse::<GponIndex>().is_err());
        assert!("1/2/x".parse::<GponIndex>().is_err());
        assert!("1/2/3/4".parse::<GponIndex>().is_err());
        assert_eq!(GponIndex::default().to_string(), "1/1/1");
    }

    #[test]
    fn test_addressing() {
        assert_eq!(olt_interface(&INDEX), "interface gpon-olt_1/2/3");
        assert_eq!(onu_interface(&INDEX, 5), "interface gpon-onu_1/2/3:5");
        assert_eq!(onu_management(&INDEX, 5), "pon-onu-mng gpon-onu_1/2/3:5");
        assert_eq!(show_onu_list(Some(&INDEX)), "show gpon onu baseinfo gpon-olt_1/2/3");
        assert_eq!(show_onu_list(None), "show gpon onu baseinfo");
        assert_eq!(
            show_onu_optical(&INDEX, 5),
            "show gpon remote-onu interface pon gpon-onu_1/2/3:5"
        );
    }

    #[test]
    fn test_serial_vendor_form() {
        assert_eq!(serial_vendor_form("5A544547C0FFEE01"), "ZTEGC0FFEE01");
        assert_eq!(serial_vendor_form("ztegc0ffee01"), "ZTEGC0FFEE01");
        // not a printable vendor code
        assert_eq!(serial_vendor_form("00000000C0FFEE01"), "00000000C0FFEE01");
    }

    #[test]
    fn test_service_commands() {
        let mut iptv = ServiceVlan::new(300, 3);
        iptv.user_vlan = Some(30);
        assert_eq!(service_port(2, &iptv), "service-port 2 vport 3 user-vlan 30 vlan 300");
        assert_eq!(service("iptv", &iptv), "service iptv gemport 3 vlan 300");
    }

    #[test]
    fn test_vlan_with_uplink() {
        assert_eq!(
            vlan(100, Some("internet"), Some("1/21/1")).unwrap(),
            vec![
                "vlan 100",
                "name internet",
                "exit",
                "interface gei_1/21/1",
                "switchport vlan 100 tag",
                "exit",
            ]
        );
        assert_eq!(
            vlan(100, None, Some("xgei_1/21/1")).unwrap()[2],
            "interface xgei_1/21/1"
        );
        assert!(vlan(100, Some("two words"), None).is_err());
        assert!(vlan(100, None, Some("uplink")).is_err());
    }

    #[test]
    fn test_wan_static() {
        let config = IpConfig::new(
            Ipv4Addr::new(10, 20, 0, 5),
            Ipv4Addr::new(255, 255, 255, 0),
            Ipv4Addr::new(10, 20, 0, 1),
            200,
        )
        .with_dns(Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(
            wan_static(&config),
            "wan-ip 1 mode static ip-address 10.20.0.5 mask 255.255.255.0 gateway 10.20.0.1 vlan 200 primary-dns 8.8.8.8"
        );
    }

    #[test]
    fn test_eth_port_settings() {
        let config = InterfaceConfig::new(2).with_native_vlan(100).with_enabled(false);
        assert_eq!(
            eth_port_settings(&config),
            vec!["vlan port eth_0/2 mode tag vlan 100", "interface eth eth_0/2 state lock"]
        );
    }

    #[test]
    fn test_tr069() {
        let config = Tr069Config::new("https://acs.example.net")
            .with_credentials("cpe", SecretString::from("pw"))
            .with_inform_interval(3600);
        assert_eq!(
            tr069(&config, Some("pw")),
            vec![
                "tr069-mgmt 1 state unlock",
                "tr069-mgmt 1 acs https://acs.example.net validate basic username cpe password pw",
                "tr069-mgmt 1 inform-interval enable interval 3600",
            ]
        );
    }

    #[test]
    fn test_thresholds_and_speed() {
        let thresholds = AlertThresholds {
            rx_power_low: Some(-27.0),
            temperature_high: Some(70.0),
            ..Default::default()
        };
        assert_eq!(
            alarm_thresholds(&thresholds),
            "alarm optical-threshold rx-lower -27 temp-upper 70"
        );
        assert_eq!(
            traffic_limit(1, &SpeedLimit::new(50_000, 100_000)),
            "gemport 1 traffic-limit upstream 50000 downstream 100000"
        );
        assert_eq!(port_admin(false), "shutdown");
    }
}
