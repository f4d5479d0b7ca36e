//! Output parsing framework.
//!
//! OLT CLIs print human-oriented text: column-aligned tables, `key : value`
//! blocks, and sections framed by dashed rules. The functions here turn that
//! text into rows and maps. They never fail; a vendor parser decides whether
//! an empty result means "nothing there" or "this is not the output I
//! expected" (see [`VendorParser`]).
//!
//! Vendor parsers live next to their adapters under `vendors/`, and each
//! configures these functions with its own markers and key maps.

mod table;

pub use table::Table;

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::Result;
use crate::model::{AlertRecord, OltInfo, OntRecord, OpticalMetrics, SignalSample};

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid space-run regex"));

static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid column-gap regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").expect("valid number regex"));

/// Strip terminal noise from raw device output.
///
/// Removes ANSI escape sequences and every control character except newline
/// and tab, collapses runs of two or more spaces to exactly two (column gaps
/// survive, alignment padding does not), trims trailing whitespace and drops
/// blank lines. Idempotent.
pub fn clean_output(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for line in text.split('\n') {
        let printable: String = strip_ansi(line)
            .chars()
            .filter(|c| *c == '\t' || !c.is_control())
            .collect();
        let collapsed = MULTI_SPACE.replace_all(&printable, "  ");
        let collapsed = collapsed.trim_end();
        if collapsed.trim().is_empty() {
            continue;
        }
        if !cleaned.is_empty() {
            cleaned.push('\n');
        }
        cleaned.push_str(collapsed);
    }
    cleaned
}

/// Remove escape sequences from one line. The stripper drops tabs along with
/// other C0 controls, so segments are stripped separately.
fn strip_ansi(line: &str) -> String {
    line.split('\t')
        .map(|segment| String::from_utf8_lossy(&strip_ansi_escapes::strip(segment)).into_owned())
        .collect::<Vec<_>>()
        .join("\t")
}

/// Lines strictly between the first line containing `start` and the next line
/// containing `end`. No start marker means "from the top"; a start marker
/// that never appears yields nothing.
fn bounded_lines<'a>(text: &'a str, start: Option<&str>, end: Option<&str>) -> Vec<&'a str> {
    let mut lines = text.lines();
    if let Some(start) = start {
        if !lines.by_ref().any(|line| line.contains(start)) {
            return Vec::new();
        }
    }
    match end {
        Some(end) => lines.take_while(|line| !line.contains(end)).collect(),
        None => lines.collect(),
    }
}

/// Split a row into cells on runs of two or more whitespace characters.
pub fn split_columns(line: &str) -> Vec<String> {
    COLUMN_GAP
        .split(line.trim())
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a line is a table rule such as `-----` or `+====+`.
fn is_separator(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| matches!(c, '-' | '=' | '+' | ' '))
}

/// Extract a column-aligned table.
///
/// Only lines between `start_marker` and `end_marker` are considered. Rule
/// lines are skipped. Without `headers`, the first remaining line supplies
/// them. Every row is padded with empty cells or truncated to exactly
/// `headers.len()` cells, because vendor alignment drifts (long
/// descriptions, wrapped lines) and a best-effort row beats a failure.
pub fn extract_table(
    text: &str,
    headers: Option<&[&str]>,
    start_marker: Option<&str>,
    end_marker: Option<&str>,
) -> Table {
    let mut lines = bounded_lines(text, start_marker, end_marker)
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_separator(line));

    let headers: Vec<String> = match headers {
        Some(headers) => headers.iter().map(|h| h.to_string()).collect(),
        None => match lines.next() {
            Some(line) => split_columns(line),
            None => return Table::default(),
        },
    };

    let width = headers.len();
    let rows = lines
        .map(|line| {
            let mut cells = split_columns(line);
            cells.resize(width, String::new());
            cells
        })
        .collect();

    Table::new(headers, rows)
}

/// Split each line on the first `separator`; the last value of a repeated
/// key wins. Lines without the separator or with an empty key are ignored.
pub fn extract_key_value_pairs(text: &str, separator: &str) -> IndexMap<String, String> {
    let mut pairs = IndexMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(separator) {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            pairs.insert(key.to_string(), value.trim().to_string());
        }
    }
    pairs
}

/// Raw lines between the first line containing `start` and the next line
/// containing `end` (or the end of the text).
pub fn extract_section(text: &str, start: &str, end: Option<&str>) -> Vec<String> {
    bounded_lines(text, Some(start), end)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Every value that follows `key<separator>`, in order of appearance.
///
/// For fields a device prints once per value, like DNS servers.
pub fn extract_multi_value(text: &str, key: &str, separator: &str) -> Vec<String> {
    let pattern = format!(
        r"{}\s*{}\s*(.*)",
        regex::escape(key),
        regex::escape(separator)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    text.lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Whether a vendor value means "not available".
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.chars().all(|c| c == '-')
        || value.eq_ignore_ascii_case("n/a")
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("none")
}

/// Rename vendor keys to field names through `field_map`
/// (`(vendor_key, field_name)` pairs), dropping unmapped keys and
/// placeholder values.
pub fn map_fields(
    pairs: &IndexMap<String, String>,
    field_map: &[(&str, &str)],
) -> IndexMap<String, String> {
    let mut fields = IndexMap::new();
    for (vendor_key, field) in field_map {
        if let Some(value) = pairs.get(*vendor_key) {
            if !is_placeholder(value) {
                fields.insert(field.to_string(), value.clone());
            }
        }
    }
    fields
}

/// The first signed decimal in a vendor value: `"-20.111(dbm)"` → `-20.111`.
pub fn parse_number(value: &str) -> Option<f64> {
    if is_placeholder(value) {
        return None;
    }
    NUMBER
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Vendor-specific interpretation of command output.
///
/// Implementations are configured with their own markers and key maps on
/// top of the framework functions above. A response with no recognizable
/// shape at all is a parse error; a recognizable but incomplete one yields
/// partial data with the missing fields left `None`.
pub trait VendorParser: Send + Sync {
    /// ONTs on a PON port (or the whole chassis).
    fn parse_ont_list(&self, output: &str) -> Result<Vec<OntRecord>>;

    /// Detail view of one ONT.
    fn parse_ont_status(&self, output: &str) -> Result<OntRecord>;

    /// Optical readings of one ONT.
    fn parse_optical_metrics(&self, output: &str) -> Result<OpticalMetrics>;

    /// Historical optical samples of one ONT.
    fn parse_signal_history(&self, output: &str) -> Result<Vec<SignalSample>>;

    /// Alarms raised for one ONT.
    fn parse_alerts(&self, output: &str) -> Result<Vec<AlertRecord>>;

    /// Chassis identity.
    fn parse_olt_info(&self, output: &str) -> Result<OltInfo>;

    /// The device's failure message, if the output carries one.
    fn detect_failure(&self, output: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output_strips_ansi_and_controls() {
        let raw = "\x1b[1mMA5800\x1b[0m\r\n\x07  Run   state :  online\r\n\r\n   \r\n";
        assert_eq!(clean_output(raw), "MA5800\n  Run  state :  online");
    }

    #[test]
    fn test_clean_output_is_idempotent() {
        let samples = [
            "",
            "   ",
            "a     b\t\tc\r\n\r\n d",
            "\x1b[31;1mred\x1b[0m   text\x1b[K\n\n\u{9b}junk",
            "---- More ( Press 'Q' to break ) ----\x1b[37D                                     \x1b[37D",
            "tab\tonly\n\t\n  lead  ",
            "\u{fffd}\u{0}\u{1f}x",
        ];
        for sample in samples {
            let once = clean_output(sample);
            assert_eq!(clean_output(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_extract_table_infers_headers_and_pads() {
        let table = extract_table("A   B\n1   2\n3", None, None, None);
        assert_eq!(table.headers(), &["A".to_string(), "B".to_string()]);

        let records = table.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["A"], "1");
        assert_eq!(records[0]["B"], "2");
        assert_eq!(records[1]["A"], "3");
        assert_eq!(records[1]["B"], "");
    }

    #[test]
    fn test_extract_table_rows_always_match_header_width() {
        let text = "x  y  z\n1\n1  2\n1  2  3\n1  2  3  4  5\n\n-----\n  only  ";
        let table = extract_table(text, None, None, None);
        assert_eq!(table.headers().len(), 3);
        assert_eq!(table.rows().len(), 5);
        for row in table.rows() {
            assert_eq!(row.len(), 3);
        }
        assert_eq!(table.rows()[3], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_extract_table_with_markers_and_explicit_headers() {
        let text = "\
junk line
OnuIndex  Type  State
------------------------
gpon-onu_1/1/1:1  ZTE-F660  ready
gpon-onu_1/1/1:2  ZTE-F601  offline
ONU Number: 2/2";
        let table = extract_table(
            text,
            Some(&["index", "type", "state"]),
            Some("OnuIndex"),
            Some("ONU Number"),
        );
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.get(1, "state"), Some("offline"));
        assert_eq!(table.get(0, "missing"), None);
    }

    #[test]
    fn test_extract_table_missing_start_marker_is_empty() {
        let table = extract_table("A  B\n1  2", None, Some("nope"), None);
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }

    #[test]
    fn test_key_value_last_occurrence_wins() {
        let pairs = [("Run state", "offline"), ("SN", "ABC"), ("Run state", "online")];
        let text = pairs
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n");

        let kv = extract_key_value_pairs(&text, ":");
        assert_eq!(kv.len(), 2);
        assert_eq!(kv["Run state"], "online");
        assert_eq!(kv["SN"], "ABC");
    }

    #[test]
    fn test_key_value_splits_on_first_separator() {
        let kv = extract_key_value_pairs("Last up time : 2024-01-10 08:15:02\n: orphan\nno separator", ":");
        assert_eq!(kv.len(), 1);
        assert_eq!(kv["Last up time"], "2024-01-10 08:15:02");
    }

    #[test]
    fn test_extract_section() {
        let text = "header\nBEGIN\n  one\n  two\nEND\ntrailer";
        assert_eq!(extract_section(text, "BEGIN", Some("END")), vec!["  one", "  two"]);
        assert_eq!(extract_section(text, "END", None), vec!["trailer"]);
        assert!(extract_section(text, "MISSING", None).is_empty());
    }

    #[test]
    fn test_extract_multi_value() {
        let text = "Primary DNS: 8.8.8.8\nIP: 10.0.0.2\nPrimary DNS : 1.1.1.1\nPrimary DNS:";
        assert_eq!(
            extract_multi_value(text, "Primary DNS", ":"),
            vec!["8.8.8.8", "1.1.1.1"]
        );
    }

    #[test]
    fn test_map_fields_drops_placeholders_and_unmapped() {
        let mut pairs = IndexMap::new();
        pairs.insert("Run state".to_string(), "online".to_string());
        pairs.insert("Latitude(degree)".to_string(), "-".to_string());
        pairs.insert("Vendor".to_string(), "HWTC".to_string());

        let fields = map_fields(
            &pairs,
            &[("Run state", "status"), ("Latitude(degree)", "latitude")],
        );
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["status"], "online");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("-20.111(dbm)"), Some(-20.111));
        assert_eq!(parse_number("45 C"), Some(45.0));
        assert_eq!(parse_number("3.280"), Some(3.28));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("unknown"), None);
    }
}
