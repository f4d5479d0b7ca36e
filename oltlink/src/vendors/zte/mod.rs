//! ZTE ZXA10 (C300, C320, C600) support.
//!
//! # Prompt Examples
//!
//! ```text
//! ZXAN#                              # privileged exec
//! ZXAN(config)#                      # configuration
//! ZXAN(config-if)#                   # gpon-olt / gpon-onu interface
//! ZXAN(gpon-onu-mng)#                # ONU-side management
//! ```
//!
//! ONUs are addressed by [`OntLocation::GponIndex`](crate::model::OntLocation::GponIndex),
//! a `shelf/slot/port` string.

mod adapter;
pub mod commands;
mod parser;

pub use adapter::ZteAdapter;
pub use parser::ZteParser;

use crate::transport::Protocol;
use crate::vendors::VendorProfile;

/// Registry name.
pub const VENDOR: &str = "zte";

/// Create the ZTE vendor profile.
pub fn profile() -> VendorProfile {
    VendorProfile::new(VENDOR, Protocol::Telnet)
        .with_config_mode("configure terminal", "end", "exit")
        .with_failure_pattern("%Error")
        .with_failure_pattern("%Code")
        .with_failure_pattern("Invalid input")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
}
