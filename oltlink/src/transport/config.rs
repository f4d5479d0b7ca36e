//! Session configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. OLTs in lab racks often regenerate
    /// keys on every firmware upgrade.
    Disabled,
}

/// CLI access protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ssh,
    Telnet,
}

impl Protocol {
    /// Well-known port for this protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ssh => f.write_str("ssh"),
            Protocol::Telnet => f.write_str("telnet"),
        }
    }
}

/// Connection and command-timing configuration for one CLI session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Password for authentication.
    pub password: SecretString,

    /// Access protocol.
    pub protocol: Protocol,

    /// Connection and login timeout.
    pub timeout: Duration,

    /// Fixed delay before draining output when no expect pattern is given.
    pub command_delay: Duration,

    /// Upper bound on how long a single command may take.
    pub command_timeout: Duration,

    /// Output is considered complete after this long without new data.
    pub drain_idle: Duration,

    /// Reply window used by the liveness probe.
    pub probe_window: Duration,

    /// Line terminator appended to every command.
    pub line_ending: String,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode (SSH only).
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (SSH only).
    pub known_hosts_path: Option<PathBuf>,

    /// Commands run after every successful (re)connect.
    pub on_open_commands: Vec<String>,
}

impl SessionConfig {
    /// Create a configuration with default timings for the given target.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port: Protocol::Ssh.default_port(),
            username: username.into(),
            password,
            protocol: Protocol::Ssh,
            timeout: Duration::from_secs(30),
            command_delay: Duration::from_secs(1),
            command_timeout: Duration::from_secs(30),
            drain_idle: Duration::from_millis(300),
            probe_window: Duration::from_millis(500),
            line_ending: "\n".to_string(),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            on_open_commands: Vec::new(),
        }
    }

    /// Set the protocol. Also resets the port to the protocol's default.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self.port = protocol.default_port();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default fixed delay and the per-command upper bound.
    pub fn with_command_timing(mut self, delay: Duration, max_wait: Duration) -> Self {
        self.command_delay = delay;
        self.command_timeout = max_wait;
        self
    }

    pub fn with_drain_idle(mut self, idle: Duration) -> Self {
        self.drain_idle = idle;
        self
    }

    pub fn with_probe_window(mut self, window: Duration) -> Self {
        self.probe_window = window;
        self
    }

    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn with_known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Add a command to run after each connect.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_switch_resets_port() {
        let config = SessionConfig::new("10.0.0.1", "admin", SecretString::from("pw"))
            .with_protocol(Protocol::Telnet);
        assert_eq!(config.port, 23);
        assert_eq!(config.socket_addr(), "10.0.0.1:23");

        let config = config.with_port(2323);
        assert_eq!(config.port, 2323);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SessionConfig::new("olt", "admin", SecretString::from("hunter2"));
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
    }
}
