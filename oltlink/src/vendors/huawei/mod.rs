//! Huawei SmartAX (MA5600T, MA5683T, MA5800) support.
//!
//! The CLI has three levels this adapter moves through:
//! - user view with a `>` prompt, left right after login with `enable`
//! - privileged view with a `#` prompt
//! - configuration with `(config)#`, and `(config-if-gpon-F/S)#` inside a
//!   GPON board
//!
//! # Prompt Examples
//!
//! ```text
//! MA5800-X7>                         # user view
//! MA5800-X7#                         # privileged view
//! MA5800-X7(config)#                 # configuration
//! MA5800-X7(config-if-gpon-0/1)#     # GPON board interface
//! ```
//!
//! ONTs are addressed by [`OntLocation::FrameSlot`](crate::model::OntLocation::FrameSlot).

mod adapter;
pub mod commands;
mod parser;

pub use adapter::HuaweiAdapter;
pub use parser::HuaweiParser;

use crate::transport::Protocol;
use crate::vendors::VendorProfile;

/// Registry name.
pub const VENDOR: &str = "huawei";

/// Create the Huawei vendor profile.
///
/// `undo smart` turns off interactive parameter prompting and `scroll 512`
/// keeps long listings from stopping at `---- More ----`.
pub fn profile() -> VendorProfile {
    VendorProfile::new(VENDOR, Protocol::Ssh)
        .with_config_mode("config", "quit", "quit")
        .with_failure_pattern("Failure:")
        .with_failure_pattern("% Unknown command")
        .with_failure_pattern("% Parameter error")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Too many parameters")
        .with_on_open_command("enable")
        .with_on_open_command("undo smart")
        .with_on_open_command("scroll 512")
}
