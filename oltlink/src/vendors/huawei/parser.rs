//! Huawei output parsing.
//!
//! # Output Examples
//!
//! ```text
//! MA5800-X7#display ont info 0 1 0 all
//!   -----------------------------------------------------------------------
//!   F/S/P   ONT         SN         Control     Run      Config   Match
//!           ID                     flag        state    state    state
//!   -----------------------------------------------------------------------
//!   0/ 1/0    0  48575443A1B2C3D4  active      online   normal   match
//!   0/ 1/0    1  48575443E5F6A7B8  active      offline  initial  initial
//!   -----------------------------------------------------------------------
//!   F/S/P   ONT-ID   Description
//!   -----------------------------------------------------------------------
//!   0/ 1/0       0   CUST-1001
//!   -----------------------------------------------------------------------
//!   In port 0/ 1/0 , the total of ONTs are: 2, online: 1
//! ```
//!
//! Single-ONT views (`display ont info F S P ID`, `display ont
//! optical-info P ID`, `display version`) are `key : value` blocks.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{
    AlertRecord, AlertSeverity, OltInfo, OntLocation, OntRecord, OntState, OpticalMetrics,
    SignalSample,
};
use crate::parser::{
    VendorParser, clean_output, extract_key_value_pairs, extract_section, extract_table,
    is_placeholder, map_fields, parse_number,
};
use crate::vendors::{VendorProfile, gps_from_fields};

static LIST_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d+)/\s*(\d+)/\s*(\d+)\s+(\d+)\s+([0-9A-Fa-f]{16})\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)",
    )
    .expect("valid ONT row regex")
});

static DESCRIPTION_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)/\s*(\d+)/\s*(\d+)\s+(\d+)\s+(\S.*?)\s*$").expect("valid description regex")
});

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*/\s*(\d+)\s*/\s*(\d+)").expect("valid frame/slot/port regex")
});

static UPTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)uptime is\s+(.+)").expect("valid uptime regex"));

/// Output printed when a port has no ONTs.
const NO_ONT: &str = "no ONT available";

/// Output printed for an unregistered or unreachable ONT.
const NOT_ONLINE: &str = "not online";

const STATUS_FIELDS: &[(&str, &str)] = &[
    ("F/S/P", "location"),
    ("ONT-ID", "ont_id"),
    ("Control flag", "admin_state"),
    ("Run state", "run_state"),
    ("Config state", "config_state"),
    ("Match state", "match_state"),
    ("SN", "serial_number"),
    ("Description", "description"),
    ("Last down cause", "last_down_cause"),
    ("Last up time", "last_up_time"),
    ("ONT online duration", "online_duration"),
    ("Equipment-ID", "ont_type"),
    ("Longitude(degree)", "longitude"),
    ("Latitude(degree)", "latitude"),
    ("Altitude(m)", "altitude"),
];

const OPTICAL_FIELDS: &[(&str, &str)] = &[
    ("Rx optical power(dBm)", "rx_power"),
    ("Tx optical power(dBm)", "tx_power"),
    ("OLT Rx ONT optical power(dBm)", "olt_rx_power"),
    ("Temperature(C)", "temperature"),
    ("Voltage(V)", "voltage"),
    ("Laser bias current(mA)", "bias_current"),
];

const HISTORY_MARKER: &str = "Rx power(dBm)";
const HISTORY_HEADERS: &[&str] = &["Time", "Rx power(dBm)", "Tx power(dBm)", "Bias(mA)"];

const ALARM_MARKER: &str = "AlarmSN";
const ALARM_HEADERS: &[&str] = &["AlarmSN", "Date&Time", "Level", "Alarm Name", "Parameters"];

const VERSION_FIELDS: &[(&str, &str)] = &[("VERSION", "version"), ("PRODUCT", "model")];

/// Parser for Huawei SmartAX CLI output.
#[derive(Debug, Clone)]
pub struct HuaweiParser {
    profile: VendorProfile,
}

impl HuaweiParser {
    pub fn new(profile: VendorProfile) -> Self {
        Self { profile }
    }

    /// Whether the device reported an empty port rather than a listing.
    pub fn is_empty_listing(output: &str) -> bool {
        output.contains(NO_ONT)
    }

    /// Whether the device refused an ONT query because the ONT is offline.
    pub fn is_offline(output: &str) -> bool {
        output.contains(NOT_ONLINE)
    }
}

fn location_from(value: &str) -> Option<OntLocation> {
    let caps = LOCATION.captures(value)?;
    Some(OntLocation::frame_slot(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// Table rows start with a date; the trailing prompt does not.
fn is_timestamp(value: &str) -> bool {
    value.starts_with(|c: char| c.is_ascii_digit())
}

fn absent(text: &str) -> bool {
    text.lines().all(is_placeholder)
}

impl VendorParser for HuaweiParser {
    fn parse_ont_list(&self, output: &str) -> Result<Vec<OntRecord>> {
        let text = clean_output(output);
        if absent(&text) || Self::is_empty_listing(&text) {
            return Ok(Vec::new());
        }

        let mut onts: Vec<OntRecord> = text
            .lines()
            .filter_map(|line| LIST_ROW.captures(line))
            .map(|caps| OntRecord {
                ont_id: caps[4].parse().ok(),
                serial_number: Some(caps[5].to_uppercase()),
                status: OntState::from_vendor(&caps[7]),
                admin_state: Some(caps[6].to_string()),
                run_state: Some(caps[7].to_string()),
                config_state: Some(caps[8].to_string()),
                match_state: Some(caps[9].to_string()),
                location: location_from(&caps[0]),
                ..Default::default()
            })
            .collect();

        if onts.is_empty() {
            if text.contains("F/S/P") {
                return Ok(Vec::new());
            }
            return Err(Error::parse("no ONT table in Huawei ONT listing"));
        }

        for line in extract_section(&text, "Description", Some("the total of ONTs")) {
            let Some(caps) = DESCRIPTION_ROW.captures(&line) else {
                continue;
            };
            let location = location_from(&caps[0]);
            let ont_id = caps[4].parse::<u32>().ok();
            let description = caps[5].trim();
            if is_placeholder(description) {
                continue;
            }
            if let Some(ont) = onts
                .iter_mut()
                .find(|ont| ont.ont_id == ont_id && ont.location == location)
            {
                ont.description = Some(description.to_string());
            }
        }

        Ok(onts)
    }

    fn parse_ont_status(&self, output: &str) -> Result<OntRecord> {
        let text = clean_output(output);
        let fields = map_fields(&extract_key_value_pairs(&text, ":"), STATUS_FIELDS);
        if !fields.contains_key("ont_id") && !fields.contains_key("run_state") {
            return Err(Error::parse("no ONT detail in Huawei output"));
        }

        let run_state = fields.get("run_state").cloned();
        Ok(OntRecord {
            ont_id: fields.get("ont_id").and_then(|v| v.parse().ok()),
            // `48575443A1B2C3D4 (HWTC-A1B2C3D4)`
            serial_number: fields
                .get("serial_number")
                .and_then(|v| v.split_whitespace().next())
                .map(str::to_string),
            status: run_state
                .as_deref()
                .map(OntState::from_vendor)
                .unwrap_or_default(),
            run_state,
            admin_state: fields.get("admin_state").cloned(),
            config_state: fields.get("config_state").cloned(),
            match_state: fields.get("match_state").cloned(),
            description: fields.get("description").cloned(),
            location: fields.get("location").and_then(|v| location_from(v)),
            ont_type: fields.get("ont_type").cloned(),
            last_down_cause: fields.get("last_down_cause").cloned(),
            last_up_time: fields.get("last_up_time").cloned(),
            online_duration: fields.get("online_duration").cloned(),
            metrics: None,
            gps: gps_from_fields(
                fields.get("latitude"),
                fields.get("longitude"),
                fields.get("altitude"),
            ),
        })
    }

    fn parse_optical_metrics(&self, output: &str) -> Result<OpticalMetrics> {
        let text = clean_output(output);
        if absent(&text) || Self::is_offline(&text) {
            return Ok(OpticalMetrics::default());
        }

        let pairs = extract_key_value_pairs(&text, ":");
        if !OPTICAL_FIELDS.iter().any(|(key, _)| pairs.contains_key(*key)) {
            return Err(Error::parse("no optical readings in Huawei output"));
        }

        let fields = map_fields(&pairs, OPTICAL_FIELDS);
        let number = |field: &str| fields.get(field).and_then(|v| parse_number(v));
        Ok(OpticalMetrics {
            rx_power: number("rx_power"),
            tx_power: number("tx_power"),
            olt_rx_power: number("olt_rx_power"),
            temperature: number("temperature"),
            voltage: number("voltage"),
            bias_current: number("bias_current"),
        })
    }

    fn parse_signal_history(&self, output: &str) -> Result<Vec<SignalSample>> {
        let text = clean_output(output);
        if absent(&text) {
            return Ok(Vec::new());
        }

        if !text.contains(HISTORY_MARKER) {
            return Err(Error::parse("no optical history table in Huawei output"));
        }
        let table = extract_table(&text, Some(HISTORY_HEADERS), Some(HISTORY_MARKER), None);

        Ok(table
            .records()
            .into_iter()
            .filter_map(|record| {
                let timestamp = record.get("Time").filter(|t| is_timestamp(t))?.clone();
                let number = |key: &str| record.get(key).and_then(|v| parse_number(v));
                Some(SignalSample {
                    timestamp,
                    rx_power: number("Rx power(dBm)"),
                    tx_power: number("Tx power(dBm)"),
                    bias_current: number("Bias(mA)"),
                })
            })
            .collect())
    }

    fn parse_alerts(&self, output: &str) -> Result<Vec<AlertRecord>> {
        let text = clean_output(output);
        if absent(&text) || text.contains("No alarm") {
            return Ok(Vec::new());
        }

        if !text.contains(ALARM_MARKER) {
            return Err(Error::parse("no alarm table in Huawei output"));
        }
        let table = extract_table(&text, Some(ALARM_HEADERS), Some(ALARM_MARKER), None);

        Ok(table
            .records()
            .into_iter()
            .filter(|record| record.get("Date&Time").is_some_and(|t| is_timestamp(t)))
            .map(|record| {
                let field = |key: &str| record.get(key).cloned().unwrap_or_default();
                let alert_type = field("Alarm Name");
                let parameters = field("Parameters");
                AlertRecord {
                    timestamp: field("Date&Time"),
                    description: if parameters.is_empty() {
                        alert_type.clone()
                    } else {
                        parameters
                    },
                    alert_type,
                    severity: AlertSeverity::from_vendor(&field("Level")),
                }
            })
            .collect())
    }

    fn parse_olt_info(&self, output: &str) -> Result<OltInfo> {
        let text = clean_output(output);
        let fields = map_fields(&extract_key_value_pairs(&text, ":"), VERSION_FIELDS);
        if fields.is_empty() {
            return Err(Error::parse("no version block in Huawei output"));
        }

        Ok(OltInfo {
            vendor: self.profile.name.clone(),
            model: fields.get("model").cloned(),
            version: fields.get("version").cloned(),
            hostname: None,
            uptime: UPTIME
                .captures(&text)
                .map(|caps| caps[1].trim().to_string()),
        })
    }

    fn detect_failure(&self, output: &str) -> Option<String> {
        self.profile.detect_failure(output)
    }
}
