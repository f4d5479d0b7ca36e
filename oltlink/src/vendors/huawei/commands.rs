//! Huawei MA5600T/MA5800 command templates.
//!
//! ONT-level commands run inside `interface gpon F/S` and take the PON
//! port and ONT id as leading arguments; service ports and VLANs live in
//! global config.

use std::fmt;

use crate::adapter::{
    AlertThresholds, DhcpConfig, InterfaceConfig, IpConfig, RoutingMode, ServiceVlan, SpeedLimit,
    Tr069Config,
};
use crate::error::{Error, Result};
use crate::model::GpsLocation;

/// A GPON port as `frame/slot/port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PonPort {
    pub frame: u16,
    pub slot: u16,
    pub port: u16,
}

impl PonPort {
    pub fn new(frame: u16, slot: u16, port: u16) -> Self {
        Self { frame, slot, port }
    }
}

impl fmt::Display for PonPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.frame, self.slot, self.port)
    }
}

/// Enter the GPON board that holds `port`.
pub fn interface(port: &PonPort) -> String {
    format!("interface gpon {}/{}", port.frame, port.slot)
}

pub fn display_version() -> String {
    "display version".to_string()
}

/// ONTs on one port, or on every board of frame 0.
pub fn display_ont_list(port: Option<&PonPort>) -> String {
    match port {
        Some(port) => format!("display ont info {} {} {} all", port.frame, port.slot, port.port),
        None => "display ont info 0 all".to_string(),
    }
}

pub fn display_ont(port: &PonPort, ont_id: u32) -> String {
    format!(
        "display ont info {} {} {} {}",
        port.frame, port.slot, port.port, ont_id
    )
}

/// Runs inside the board interface.
pub fn display_optical(port: &PonPort, ont_id: u32) -> String {
    format!("display ont optical-info {} {}", port.port, ont_id)
}

pub fn display_optical_history(port: &PonPort, ont_id: u32) -> String {
    format!("display ont optical-history {} {}", port, ont_id)
}

pub fn display_alarms(port: &PonPort, ont_id: u32) -> String {
    format!("display alarm active ont {} {}", port, ont_id)
}

/// Serial number in the 16-hex-digit form `ont add` takes:
/// `HWTC1A2B3C4D` → `485754431A2B3C4D`.
pub fn serial_hex(serial: &str) -> String {
    let serial = serial.trim();
    if serial.len() == 12 && serial.is_char_boundary(4) {
        let (vendor, rest) = serial.split_at(4);
        let vendor: String = vendor
            .to_ascii_uppercase()
            .bytes()
            .map(|b| format!("{:02X}", b))
            .collect();
        format!("{}{}", vendor, rest.to_ascii_uppercase())
    } else {
        serial.to_ascii_uppercase()
    }
}

pub fn ont_add(
    port: &PonPort,
    ont_id: u32,
    serial: &str,
    line_profile: u32,
    service_profile: u32,
    description: Option<&str>,
) -> String {
    let mut command = format!(
        "ont add {} {} sn-auth {} omci ont-lineprofile-id {} ont-srvprofile-id {}",
        port.port, ont_id, serial, line_profile, service_profile
    );
    if let Some(description) = description {
        command.push_str(&format!(" desc \"{}\"", description));
    }
    command
}

pub fn ont_delete(port: &PonPort, ont_id: u32) -> String {
    format!("ont delete {} {}", port.port, ont_id)
}

pub fn service_port(port: &PonPort, ont_id: u32, service: &ServiceVlan) -> String {
    format!(
        "service-port vlan {} gpon {} ont {} gemport {} multi-service user-vlan {} tag-transform translate",
        service.vlan,
        port,
        ont_id,
        service.gemport,
        service.user_vlan()
    )
}

pub fn undo_service_ports(port: &PonPort, ont_id: u32) -> String {
    format!("undo service-port port {} ont {}", port, ont_id)
}

pub fn ont_port_settings(port: &PonPort, ont_id: u32, config: &InterfaceConfig) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(vlan) = config.native_vlan {
        commands.push(format!(
            "ont port native-vlan {} {} eth {} vlan {} priority 0",
            port.port, ont_id, config.eth_port, vlan
        ));
    }
    if let Some(enabled) = config.enabled {
        commands.push(format!(
            "ont port attribute {} {} eth {} operational-state {}",
            port.port,
            ont_id,
            config.eth_port,
            if enabled { "on" } else { "off" }
        ));
    }
    commands
}

/// VLAN creation and uplink binding, global config.
pub fn vlan(vlan_id: u16, name: Option<&str>, uplink: Option<&str>) -> Result<Vec<String>> {
    let mut commands = vec![format!("vlan {} smart", vlan_id)];
    if let Some(name) = name {
        commands.push(format!("vlan desc {} description \"{}\"", vlan_id, name));
    }
    if let Some(uplink) = uplink {
        // `0/9/0` is written `0/9 0`
        let (board, port) = uplink
            .rsplit_once('/')
            .filter(|(board, port)| board.contains('/') && port.parse::<u16>().is_ok())
            .ok_or_else(|| {
                Error::configuration(format!("uplink {:?} is not frame/slot/port", uplink))
            })?;
        commands.push(format!("port vlan {} {} {}", vlan_id, board, port));
    }
    Ok(commands)
}

pub fn ip_static(port: &PonPort, ont_id: u32, config: &IpConfig) -> String {
    let mut command = format!(
        "ont ipconfig {} {} static ip-address {} mask {} gateway {}",
        port.port, ont_id, config.address, config.netmask, config.gateway
    );
    if let Some(primary) = config.dns.first() {
        command.push_str(&format!(" pri-dns {}", primary));
    }
    if let Some(secondary) = config.dns.get(1) {
        command.push_str(&format!(" slave-dns {}", secondary));
    }
    command.push_str(&format!(" vlan {}", config.vlan));
    command
}

pub fn ip_dhcp(port: &PonPort, ont_id: u32, config: &DhcpConfig) -> String {
    format!(
        "ont ipconfig {} {} dhcp vlan {} priority {}",
        port.port,
        ont_id,
        config.vlan,
        config.priority.unwrap_or(0)
    )
}

/// ACS profile, global config. The password is inserted verbatim, so the
/// command must be sent redacted.
pub fn tr069_profile(config: &Tr069Config, password: Option<&str>) -> String {
    let mut command = format!(
        "ont tr069-server-profile add profile-id {} url \"{}\"",
        config.profile_id, config.acs_url
    );
    if let (Some(user), Some(password)) = (config.username.as_deref(), password) {
        command.push_str(&format!(" user \"{}\" \"{}\"", user, password));
    }
    if let Some(interval) = config.inform_interval {
        command.push_str(&format!(" inform-interval {}", interval));
    }
    command
}

pub fn tr069_bind(port: &PonPort, ont_id: u32, profile_id: u32) -> String {
    format!(
        "ont tr069-server-config {} {} profile-id {}",
        port.port, ont_id, profile_id
    )
}

pub fn routing_mode(port: &PonPort, ont_id: u32, mode: RoutingMode) -> String {
    match mode {
        RoutingMode::Route => format!("ont internet-config {} {} ip-index 0", port.port, ont_id),
        RoutingMode::Bridge => format!("undo ont internet-config {} {}", port.port, ont_id),
    }
}

pub fn port_admin(port: &PonPort, enabled: bool) -> String {
    if enabled {
        format!("undo shutdown {}", port.port)
    } else {
        format!("shutdown {}", port.port)
    }
}

pub fn ont_reset(port: &PonPort, ont_id: u32) -> String {
    format!("ont reset {} {}", port.port, ont_id)
}

pub fn ont_factory_reset(port: &PonPort, ont_id: u32) -> String {
    format!("ont factory-setting-restore {} {}", port.port, ont_id)
}

pub fn alarm_thresholds(port: &PonPort, ont_id: u32, thresholds: &AlertThresholds) -> String {
    let mut command = format!("ont optical-alarm-threshold {} {}", port.port, ont_id);
    let limits = [
        ("rx-power-lower", thresholds.rx_power_low),
        ("rx-power-upper", thresholds.rx_power_high),
        ("tx-power-lower", thresholds.tx_power_low),
        ("tx-power-upper", thresholds.tx_power_high),
        ("temperature-upper", thresholds.temperature_high),
    ];
    for (keyword, value) in limits {
        if let Some(value) = value {
            command.push_str(&format!(" {} {}", keyword, value));
        }
    }
    command
}

pub fn gps(port: &PonPort, ont_id: u32, location: &GpsLocation) -> String {
    let mut command = format!(
        "ont modify {} {} longitude {} latitude {}",
        port.port, ont_id, location.longitude, location.latitude
    );
    if let Some(altitude) = location.altitude {
        command.push_str(&format!(" altitude {}", altitude));
    }
    command
}

pub fn speed_limit(port: &PonPort, ont_id: u32, limit: &SpeedLimit) -> String {
    format!(
        "ont traffic-limit {} {} upstream {} downstream {}",
        port.port, ont_id, limit.upstream_kbps, limit.downstream_kbps
    )
}
