//! Wire transports for interactive CLI sessions.
//!
//! A [`Transport`] moves raw bytes to and from a device shell. It knows
//! nothing about prompts or commands; that is the session layer's job.

pub mod config;
mod ssh;
mod telnet;

pub use config::{HostKeyVerification, Protocol, SessionConfig};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Byte-level transport to a device shell.
///
/// Implementations are reusable: `open()` after `close()` (or after a
/// failure) establishes a fresh connection.
#[async_trait]
pub trait Transport: Send {
    /// Connect, authenticate and start the interactive shell.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Tear down the connection. Never fails; errors are logged.
    async fn close(&mut self);

    /// Whether the underlying connection is believed to be up.
    fn is_open(&self) -> bool;

    /// Write raw bytes to the shell.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next chunk of output.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Build the transport matching `config.protocol`.
pub fn for_config(config: &SessionConfig) -> Box<dyn Transport> {
    match config.protocol {
        Protocol::Ssh => Box::new(SshTransport::new(config.clone())),
        Protocol::Telnet => Box::new(TelnetTransport::new(config.clone())),
    }
}
