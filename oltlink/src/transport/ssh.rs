//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::Transport;
use super::config::{HostKeyVerification, SessionConfig};
use crate::error::TransportError;

/// SSH transport: one PTY shell channel on a russh client connection.
pub struct SshTransport {
    config: SessionConfig,
    connection: Option<SshConnection>,
}

struct SshConnection {
    session: Handle<SshHandler>,
    channel: Channel<Msg>,
}

impl SshTransport {
    /// Create a transport; nothing is dialed until [`Transport::open`].
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    async fn dial(&self) -> Result<Handle<SshHandler>, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: self.config.host.clone(),
            port: self.config.port,
            host_key_verification: self.config.host_key_verification.clone(),
            known_hosts_path: self.config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        tokio::time::timeout(
            self.config.timeout,
            client::connect(
                ssh_config,
                (self.config.host.as_str(), self.config.port),
                handler,
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            match host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                Some(hk_err) => hk_err,
                None => TransportError::Ssh(e),
            }
        })
    }

    async fn authenticate(&self, session: &mut Handle<SshHandler>) -> Result<(), TransportError> {
        let result = session
            .authenticate_password(
                self.config.username.as_str(),
                self.config.password.expose_secret(),
            )
            .await?;

        if !result.success() {
            return Err(TransportError::AuthenticationFailed {
                user: self.config.username.clone(),
            });
        }
        Ok(())
    }

    async fn open_shell(&self, session: &Handle<SshHandler>) -> Result<Channel<Msg>, TransportError> {
        let channel = session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;

        channel.request_shell(true).await?;

        Ok(channel)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            self.close().await;
        }

        debug!("SSH connecting to {}", self.config.socket_addr());
        let mut session = self.dial().await?;
        self.authenticate(&mut session).await?;
        let channel = self.open_shell(&session).await?;

        self.connection = Some(SshConnection { session, channel });
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.channel.close().await {
                trace!("SSH channel close: {}", e);
            }
            if let Err(e) = connection
                .session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
            {
                warn!("SSH disconnect from {} failed: {}", self.config.host, e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| !connection.session.is_closed())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        connection.channel.data(data).await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let channel = match self.connection.as_mut() {
            Some(connection) => &mut connection.channel,
            None => return Err(TransportError::NotConnected),
        };

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, channel.wait()).await {
                Err(_) => return Ok(None),
                Ok(Some(ChannelMsg::Data { data })) => return Ok(Some(data.to_vec())),
                Ok(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    return Ok(Some(data.to_vec()));
                }
                Ok(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Ok(None) => break,
                Ok(Some(other)) => trace!("ignoring channel message {:?}", other),
            }
        }

        debug!("SSH channel to {} closed by peer", self.config.host);
        self.connection = None;
        Err(TransportError::Disconnected)
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host-key error for `dial()` to surface.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// `Ok(true)` if matched, `Ok(false)` if the host is not listed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = match self.known_hosts_path {
            Some(ref path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = match self.known_hosts_path {
            Some(ref path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let strict = match self.host_key_verification {
            HostKeyVerification::Disabled => return Ok(true),
            HostKeyVerification::AcceptNew => false,
            HostKeyVerification::Strict => true,
        };

        let accepted = match self.check_known_hosts(server_public_key) {
            Ok(true) => true,
            Ok(false) if strict => self.reject(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
            Ok(false) => {
                if let Err(e) = self.learn_host_key(server_public_key) {
                    warn!("Failed to save host key for {}: {}", self.host, e);
                }
                true
            }
            Err(e) => self.reject(e),
        };
        Ok(accepted)
    }
}
