//! Records exchanged with callers.
//!
//! Everything here derives `Serialize` so an API layer can hand results
//! straight to its encoder. Fields a device did not report are `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::Protocol;

/// An OLT as supplied by the inventory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OltDevice {
    pub id: String,
    pub name: String,
    pub vendor: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// Key of this device's entry in the credential vault.
    pub credential_ref: String,
}

/// Where an ONT (or PON port) sits on the chassis.
///
/// Vendors disagree on addressing, so each adapter accepts only its own
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum OntLocation {
    /// Huawei `frame/slot/port`.
    FrameSlot { frame: u16, slot: u16, port: u16 },
    /// ZTE `shelf/slot/port`, as used in `gpon-olt_1/1/1`.
    GponIndex { index: String },
}

impl OntLocation {
    pub fn frame_slot(frame: u16, slot: u16, port: u16) -> Self {
        OntLocation::FrameSlot { frame, slot, port }
    }

    pub fn gpon_index(index: impl Into<String>) -> Self {
        OntLocation::GponIndex {
            index: index.into(),
        }
    }
}

impl fmt::Display for OntLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OntLocation::FrameSlot { frame, slot, port } => write!(f, "{}/{}/{}", frame, slot, port),
            OntLocation::GponIndex { index } => f.write_str(index),
        }
    }
}

/// Normalized ONT operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntState {
    Online,
    Offline,
    /// Registered but still ranging, syncing MIB or being configured.
    Provisioning,
    #[default]
    Unknown,
}

impl OntState {
    /// Map a vendor state word (`online`, `working`, `OffLine`, `LOS`,
    /// `syncMib`, ...) onto the normalized state.
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" | "working" | "ready" | "up" => OntState::Online,
            "offline" | "los" | "dyinggasp" | "dying-gasp" | "down" | "disable" | "offline(los)" => {
                OntState::Offline
            }
            "initial" | "syncmib" | "logging" | "authpass" | "config" | "configuring" => {
                OntState::Provisioning
            }
            _ => OntState::Unknown,
        }
    }
}

/// Optical readings of an ONT transceiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalMetrics {
    /// Power received by the ONT, dBm.
    pub rx_power: Option<f64>,
    /// Power transmitted by the ONT, dBm.
    pub tx_power: Option<f64>,
    /// The ONT's upstream signal as received at the OLT, dBm.
    pub olt_rx_power: Option<f64>,
    /// Celsius.
    pub temperature: Option<f64>,
    /// Volts.
    pub voltage: Option<f64>,
    /// Laser bias current, mA.
    pub bias_current: Option<f64>,
}

impl OpticalMetrics {
    /// Whether the device reported nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == OpticalMetrics::default()
    }
}

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl GpsLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Whether latitude and longitude are within their ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One ONT as reported by the OLT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntRecord {
    pub ont_id: Option<u32>,
    pub serial_number: Option<String>,
    pub status: OntState,
    /// The vendor's own state word behind `status`.
    pub run_state: Option<String>,
    pub admin_state: Option<String>,
    pub config_state: Option<String>,
    pub match_state: Option<String>,
    pub description: Option<String>,
    pub location: Option<OntLocation>,
    /// Equipment type (`ZTE-F660`, `HG8245H`, ...).
    pub ont_type: Option<String>,
    pub last_down_cause: Option<String>,
    pub last_up_time: Option<String>,
    pub online_duration: Option<String>,
    pub metrics: Option<OpticalMetrics>,
    pub gps: Option<GpsLocation>,
}

/// A historical optical sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub timestamp: String,
    pub rx_power: Option<f64>,
    pub tx_power: Option<f64>,
    pub bias_current: Option<f64>,
}

/// Alarm severity as printed by the device, normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Major,
    Minor,
    Warning,
    #[default]
    Info,
}

impl AlertSeverity {
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => AlertSeverity::Critical,
            "major" => AlertSeverity::Major,
            "minor" => AlertSeverity::Minor,
            "warning" => AlertSeverity::Warning,
            _ => AlertSeverity::Info,
        }
    }
}

/// An alarm raised for an ONT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: String,
    pub alert_type: String,
    pub description: String,
    pub severity: AlertSeverity,
}

/// Chassis identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OltInfo {
    pub vendor: String,
    pub model: Option<String>,
    pub version: Option<String>,
    pub hostname: Option<String>,
    pub uptime: Option<String>,
}
