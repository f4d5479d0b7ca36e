//! Vendor adapters.
//!
//! Each vendor module pairs a command template set (`commands.rs`) with an
//! output parser (`parser.rs`) and composes both with a
//! [`TransportSession`](crate::TransportSession) in `adapter.rs`.

pub mod huawei;
mod profile;
pub mod zte;

pub use profile::VendorProfile;

use crate::model::GpsLocation;
use crate::parser::parse_number;

/// Device name from a CLI prompt: `MA5800-X7(config-if-gpon-0/1)#` →
/// `MA5800-X7`, `<OLT-01>` → `OLT-01`.
pub(crate) fn hostname_from_prompt(prompt: &str) -> Option<String> {
    let name = prompt
        .trim()
        .trim_start_matches(['<', '['])
        .split(['(', '#', '>', ']'])
        .next()
        .unwrap_or("")
        .trim_start_matches('~')
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// A GPS fix from vendor latitude/longitude/altitude strings. Missing,
/// placeholder and out-of-range coordinates give `None`.
pub(crate) fn gps_from_fields(
    latitude: Option<&String>,
    longitude: Option<&String>,
    altitude: Option<&String>,
) -> Option<GpsLocation> {
    let latitude = parse_number(latitude?)?;
    let longitude = parse_number(longitude?)?;
    let location = GpsLocation {
        latitude,
        longitude,
        altitude: altitude.and_then(|a| parse_number(a)),
    };
    location.is_valid().then_some(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_from_prompt() {
        assert_eq!(hostname_from_prompt("MA5800-X7#").as_deref(), Some("MA5800-X7"));
        assert_eq!(
            hostname_from_prompt("MA5800-X7(config-if-gpon-0/1)#").as_deref(),
            Some("MA5800-X7")
        );
        assert_eq!(hostname_from_prompt("<OLT-01>").as_deref(), Some("OLT-01"));
        assert_eq!(hostname_from_prompt("ZXAN#").as_deref(), Some("ZXAN"));
        assert_eq!(hostname_from_prompt("#"), None);
    }

    #[test]
    fn test_gps_from_fields() {
        let lat = "-6.175392".to_string();
        let lon = "106.827153".to_string();
        let gps = gps_from_fields(Some(&lat), Some(&lon), None).unwrap();
        assert_eq!(gps.latitude, -6.175392);
        assert_eq!(gps.longitude, 106.827153);

        let dash = "-".to_string();
        assert!(gps_from_fields(Some(&dash), Some(&lon), None).is_none());
        assert!(gps_from_fields(None, Some(&lon), None).is_none());

        let far = "200".to_string();
        assert!(gps_from_fields(Some(&lat), Some(&far), None).is_none());
    }
}
