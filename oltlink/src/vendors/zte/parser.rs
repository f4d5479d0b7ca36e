//! ZTE output parsing.
//!
//! # Output Examples
//!
//! ```text
//! ZXAN#show gpon onu baseinfo gpon-olt_1/1/1
//! OnuIndex                 Type          Mode        AuthInfo             State
//! -------------------------------------------------------------------------------
//! gpon-onu_1/1/1:1         ZTE-F660      sn          SN:ZTEGC0FFEE01      ready
//! gpon-onu_1/1/1:2         ZTE-F601      sn          SN:ZTEGC0FFEE02      OffLine
//! ONU Number: 2/2
//! ```
//!
//! `show gpon onu detail-info` is a `key: value` block followed by an
//! authentication history table; `show pon power attenuation` prints the
//! upstream and downstream levels side by side.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{
    AlertRecord, AlertSeverity, OltInfo, OntLocation, OntRecord, OntState, OpticalMetrics,
    SignalSample,
};
use crate::parser::{
    VendorParser, clean_output, extract_key_value_pairs, extract_table, is_placeholder,
    map_fields, parse_number,
};
use crate::vendors::{VendorProfile, gps_from_fields};

static LIST_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*gpon-onu_(\d+/\d+/\d+):(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)")
        .expect("valid ONU row regex")
});

static ONU_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"gpon-onu_(\d+/\d+/\d+):(\d+)").expect("valid ONU name regex"));

static HISTORY_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\d+\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s*(.*)$",
    )
    .expect("valid auth history regex")
});

static UPSTREAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bup\s+Rx\s*:\s*(-?\d+(?:\.\d+)?)").expect("valid upstream regex")
});

static DOWNSTREAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdown\s+Tx\s*:\s*(-?\d+(?:\.\d+)?)\S*\s+Rx\s*:\s*(-?\d+(?:\.\d+)?)")
        .expect("valid downstream regex")
});

static MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ZXA10\s+(C\d{3})").expect("valid model regex"));

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bV\d+(?:\.\d+)+").expect("valid version regex"));

/// Printed instead of a table when there is nothing to show.
const NO_INFORMATION: &str = "No related information";

const NOT_ONLINE: &str = "not online";

/// Unset timestamps in the authentication history.
const ZERO_TIME: &str = "0000-00-00 00:00:00";

const HISTORY_MARKER: &str = "Rx(dBm)";
const HISTORY_HEADERS: &[&str] = &["Time", "Rx(dBm)", "Tx(dBm)", "Bias(mA)"];

const ALARM_MARKER: &str = "AlarmID";
const ALARM_HEADERS: &[&str] = &["AlarmID", "Level", "Time", "Description"];

const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("ONU interface", "interface"),
    ("Name", "name"),
    ("Type", "ont_type"),
    ("State", "state"),
    ("Admin state", "admin_state"),
    ("Phase state", "run_state"),
    ("Config state", "config_state"),
    ("Serial number", "serial_number"),
    ("Description", "description"),
    ("Online Duration", "online_duration"),
    ("Longitude", "longitude"),
    ("Latitude", "latitude"),
    ("Altitude", "altitude"),
];

const OPTICAL_FIELDS: &[(&str, &str)] = &[
    ("Rx optical level", "rx_power"),
    ("Tx optical level", "tx_power"),
    ("Laser bias current", "bias_current"),
    ("Temperature", "temperature"),
    ("Supply voltage", "voltage"),
];

/// Parser for ZTE ZXA10 CLI output.
#[derive(Debug, Clone)]
pub struct ZteParser {
    profile: VendorProfile,
}

impl ZteParser {
    pub fn new(profile: VendorProfile) -> Self {
        Self { profile }
    }

    /// Whether the device printed its "nothing to show" notice.
    pub fn is_empty_listing(output: &str) -> bool {
        output.contains(NO_INFORMATION)
    }

    /// Whether the device refused an ONU query because the ONU is offline.
    pub fn is_offline(output: &str) -> bool {
        output.contains(NOT_ONLINE)
    }
}

/// Table rows start with a date; the trailing prompt does not.
fn is_timestamp(value: &str) -> bool {
    value.starts_with(|c: char| c.is_ascii_digit())
}

fn absent(text: &str) -> bool {
    text.lines().all(is_placeholder)
}

/// `(location, onu id)` from `gpon-onu_1/1/1:3`.
fn onu_from(value: &str) -> Option<(OntLocation, u32)> {
    let caps = ONU_NAME.captures(value)?;
    Some((OntLocation::gpon_index(&caps[1]), caps[2].parse().ok()?))
}

/// Most recent login and the cause of the most recent logout from the
/// authentication history rows.
fn auth_history(text: &str) -> (Option<String>, Option<String>) {
    let mut last_up: Option<String> = None;
    let mut last_down: Option<(String, String)> = None;

    for caps in text.lines().filter_map(|line| HISTORY_ROW.captures(line)) {
        let up = &caps[1];
        let down = &caps[2];
        let cause = caps[3].trim();

        if up != ZERO_TIME && last_up.as_deref().is_none_or(|seen| up > seen) {
            last_up = Some(up.to_string());
        }
        if down != ZERO_TIME
            && !cause.is_empty()
            && last_down.as_ref().is_none_or(|(seen, _)| down > seen.as_str())
        {
            last_down = Some((down.to_string(), cause.to_string()));
        }
    }
    (last_up, last_down.map(|(_, cause)| cause))
}

impl VendorParser for ZteParser {
    fn parse_ont_list(&self, output: &str) -> Result<Vec<OntRecord>> {
        let text = clean_output(output);
        if absent(&text) || Self::is_empty_listing(&text) {
            return Ok(Vec::new());
        }

        let onts: Vec<OntRecord> = text
            .lines()
            .filter_map(|line| LIST_ROW.captures(line))
            .map(|caps| {
                let auth = &caps[5];
                let serial = auth.strip_prefix("SN:").unwrap_or(auth);
                OntRecord {
                    ont_id: caps[2].parse().ok(),
                    location: Some(OntLocation::gpon_index(&caps[1])),
                    ont_type: Some(caps[3].to_string()),
                    serial_number: (!is_placeholder(serial)).then(|| serial.to_uppercase()),
                    status: OntState::from_vendor(&caps[6]),
                    run_state: Some(caps[6].to_string()),
                    ..Default::default()
                }
            })
            .collect();

        if onts.is_empty() && !text.contains("OnuIndex") {
            return Err(Error::parse("no ONU table in ZTE baseinfo output"));
        }
        Ok(onts)
    }

    fn parse_ont_status(&self, output: &str) -> Result<OntRecord> {
        let text = clean_output(output);
        let fields = map_fields(&extract_key_value_pairs(&text, ":"), DETAIL_FIELDS);
        if !fields.contains_key("interface") && !fields.contains_key("run_state") {
            return Err(Error::parse("no ONU detail in ZTE output"));
        }

        let onu = fields.get("interface").and_then(|v| onu_from(v));
        // `State` is the registration state; `Phase state` the link state
        let run_state = fields
            .get("run_state")
            .or_else(|| fields.get("state"))
            .cloned();
        let (last_up_time, last_down_cause) = auth_history(&text);

        Ok(OntRecord {
            ont_id: onu.as_ref().map(|(_, id)| *id),
            serial_number: fields.get("serial_number").map(|v| v.to_uppercase()),
            status: run_state
                .as_deref()
                .map(OntState::from_vendor)
                .unwrap_or_default(),
            run_state,
            admin_state: fields.get("admin_state").cloned(),
            config_state: fields.get("config_state").cloned(),
            match_state: None,
            description: fields
                .get("description")
                .or_else(|| fields.get("name"))
                .cloned(),
            location: onu.map(|(location, _)| location),
            ont_type: fields.get("ont_type").cloned(),
            last_down_cause,
            last_up_time,
            online_duration: fields.get("online_duration").cloned(),
            metrics: None,
            gps: gps_from_fields(
                fields.get("latitude"),
                fields.get("longitude"),
                fields.get("altitude"),
            ),
        })
    }

    /// Expects the ONU transceiver block, the attenuation table, or both
    /// concatenated.
    fn parse_optical_metrics(&self, output: &str) -> Result<OpticalMetrics> {
        let text = clean_output(output);
        if absent(&text) || Self::is_offline(&text) {
            return Ok(OpticalMetrics::default());
        }

        let pairs = extract_key_value_pairs(&text, ":");
        let upstream = UPSTREAM.captures(&text);
        let downstream = DOWNSTREAM.captures(&text);
        let has_block = OPTICAL_FIELDS.iter().any(|(key, _)| pairs.contains_key(*key));
        if !has_block && upstream.is_none() && downstream.is_none() {
            return Err(Error::parse("no optical readings in ZTE output"));
        }

        let fields = map_fields(&pairs, OPTICAL_FIELDS);
        let number = |field: &str| fields.get(field).and_then(|v| parse_number(v));
        Ok(OpticalMetrics {
            rx_power: number("rx_power")
                .or_else(|| downstream.as_ref().and_then(|caps| parse_number(&caps[2]))),
            tx_power: number("tx_power"),
            olt_rx_power: upstream.as_ref().and_then(|caps| parse_number(&caps[1])),
            temperature: number("temperature"),
            voltage: number("voltage"),
            bias_current: number("bias_current"),
        })
    }

    fn parse_signal_history(&self, output: &str) -> Result<Vec<SignalSample>> {
        let text = clean_output(output);
        if absent(&text) || Self::is_empty_listing(&text) {
            return Ok(Vec::new());
        }

        if !text.contains(HISTORY_MARKER) {
            return Err(Error::parse("no power history table in ZTE output"));
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
                    rx_power: number("Rx(dBm)"),
                    tx_power: number("Tx(dBm)"),
                    bias_current: number("Bias(mA)"),
                })
            })
            .collect())
    }

    fn parse_alerts(&self, output: &str) -> Result<Vec<AlertRecord>> {
        let text = clean_output(output);
        if absent(&text) || Self::is_empty_listing(&text) {
            return Ok(Vec::new());
        }

        if !text.contains(ALARM_MARKER) {
            return Err(Error::parse("no alarm table in ZTE output"));
        }
        let table = extract_table(&text, Some(ALARM_HEADERS), Some(ALARM_MARKER), None);

        Ok(table
            .records()
            .into_iter()
            .filter(|record| record.get("Time").is_some_and(|t| is_timestamp(t)))
            .map(|record| {
                let field = |key: &str| record.get(key).cloned().unwrap_or_default();
                AlertRecord {
                    timestamp: field("Time"),
                    alert_type: field("AlarmID"),
                    description: field("Description"),
                    severity: AlertSeverity::from_vendor(&field("Level")),
                }
            })
            .collect())
    }

    fn parse_olt_info(&self, output: &str) -> Result<OltInfo> {
        let text = clean_output(output);
        let pairs = extract_key_value_pairs(&text, ":");
        let description = pairs.get("System Description");
        if description.is_none() && !pairs.contains_key("System Name") {
            return Err(Error::parse("no system group in ZTE output"));
        }

        let description = description.map(String::as_str).unwrap_or("");
        Ok(OltInfo {
            vendor: self.profile.name.clone(),
            model: MODEL.captures(description).map(|caps| caps[1].to_string()),
            version: VERSION.find(description).map(|m| m.as_str().to_string()),
            hostname: pairs
                .get("System Name")
                .filter(|name| !is_placeholder(name))
                .cloned(),
            uptime: pairs
                .get("Started before")
                .filter(|uptime| !is_placeholder(uptime))
                .cloned(),
        })
    }

    fn detect_failure(&self, output: &str) -> Option<String> {
        self.profile.detect_failure(output)
    }
}
