//! Per-vendor CLI conventions.

use crate::transport::Protocol;

/// What an adapter needs to know about a vendor's CLI besides the command
/// syntax itself.
#[derive(Debug, Clone)]
pub struct VendorProfile {
    /// Registry name (`huawei`, `zte`).
    pub name: String,

    /// Protocol the vendor's OLTs ship with enabled.
    pub default_protocol: Protocol,

    /// Substrings that mark a command as rejected by the device.
    pub failed_when_contains: Vec<String>,

    /// Run after every (re)connect: privilege, pagination, terminal width.
    pub on_open_commands: Vec<String>,

    /// Enters global configuration mode.
    pub config_enter: String,

    /// Leaves configuration mode from any depth.
    pub config_exit: String,

    /// Leaves one configuration sub-mode (interface, ONU management).
    pub submode_exit: String,
}

impl VendorProfile {
    pub fn new(name: impl Into<String>, default_protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            default_protocol,
            failed_when_contains: vec![],
            on_open_commands: vec![],
            config_enter: "configure terminal".to_string(),
            config_exit: "end".to_string(),
            submode_exit: "exit".to_string(),
        }
    }

    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    pub fn with_config_mode(
        mut self,
        enter: impl Into<String>,
        exit: impl Into<String>,
        submode_exit: impl Into<String>,
    ) -> Self {
        self.config_enter = enter.into();
        self.config_exit = exit.into();
        self.submode_exit = submode_exit.into();
        self
    }

    /// The first output line carrying a failure pattern, trimmed.
    pub fn detect_failure(&self, output: &str) -> Option<String> {
        output
            .lines()
            .find(|line| {
                self.failed_when_contains
                    .iter()
                    .any(|pattern| line.contains(pattern.as_str()))
            })
            .map(|line| line.trim().to_string())
    }

    pub fn on_open_commands(&self) -> Vec<&str> {
        self.on_open_commands.iter().map(String::as_str).collect()
    }
}
