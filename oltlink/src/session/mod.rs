//! Command engine on top of a [`Transport`].
//!
//! A [`TransportSession`] owns one transport and turns it into a
//! command/response channel: it detects the prompt after login, runs the
//! vendor's session setup, writes commands and decides when their output is
//! complete. It also owns the recovery policy: a command that hits a
//! transport failure is retried once on a fresh connection.

mod options;
mod response;

pub use options::CommandOptions;
pub use response::CommandResult;

use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, info, trace, warn};
use regex::Regex;
use tokio::time::Instant;

use crate::channel::PatternBuffer;
use crate::error::{Error, Result, TransportError};
use crate::parser;
use crate::transport::{self, SessionConfig, Transport};

/// Last-line shapes accepted as a new prompt after a command
/// (`MA5800(config)#`, `ZXAN#`, `<HUAWEI>`, `[~HUAWEI]`).
static PROMPT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#>$\]]\s*$").expect("valid prompt regex"));

/// How long to look for leftover output before writing a command.
const STALE_WINDOW: Duration = Duration::from_millis(10);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// A command is in flight.
    Busy,
}

/// An interactive CLI session with one OLT.
pub struct TransportSession {
    config: SessionConfig,
    transport: Box<dyn Transport>,
    state: SessionState,
    prompt: Option<String>,
    buffer: PatternBuffer,
}

impl TransportSession {
    /// Create a session with the transport `config.protocol` calls for.
    pub fn new(config: SessionConfig) -> Self {
        let transport = transport::for_config(&config);
        Self::with_transport(config, transport)
    }

    /// Create a session over a caller-supplied transport.
    pub fn with_transport(config: SessionConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            state: SessionState::Disconnected,
            prompt: None,
            buffer: PatternBuffer::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The prompt seen at login or after the last command.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Open the session. Failures are logged, never raised.
    pub async fn connect(&mut self) -> bool {
        match self.establish().await {
            Ok(()) => {
                info!(
                    "Connected to {} over {} (prompt {:?})",
                    self.config.socket_addr(),
                    self.config.protocol,
                    self.prompt.as_deref().unwrap_or("")
                );
                true
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", self.config.socket_addr(), e);
                false
            }
        }
    }

    /// Close the session. Safe to call when already closed.
    pub async fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            debug!("Disconnecting from {}", self.config.host);
        }
        self.teardown().await;
    }

    /// Probe the session by sending a bare line ending and waiting
    /// `probe_window` for any reply.
    ///
    /// This is a heuristic: a slow device can look dead and a half-open
    /// TCP connection can look alive until the next write. A failed write
    /// marks the session disconnected.
    pub async fn is_connected(&mut self) -> bool {
        if self.state == SessionState::Disconnected || !self.transport.is_open() {
            return false;
        }

        let line_ending = self.config.line_ending.clone();
        if let Err(e) = self.transport.write(line_ending.as_bytes()).await {
            debug!("Probe write to {} failed: {}", self.config.host, e);
            self.teardown().await;
            return false;
        }

        match self.transport.read(self.config.probe_window).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                debug!("Probe read from {} failed: {}", self.config.host, e);
                self.teardown().await;
                false
            }
        }
    }

    /// Send a command with the session's default timing and return its raw
    /// output.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        self.send_command_with(command, &CommandOptions::default())
            .await
    }

    /// Send a command and return its raw output.
    ///
    /// A disconnected session is reconnected once first. A transport failure
    /// while the command is in flight tears the connection down, reconnects
    /// and retries the command exactly once. Waiting for an `expect` marker
    /// that never shows up is not retried.
    pub async fn send_command_with(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<String> {
        let shown = if options.redact { "<redacted>" } else { command };

        if self.state == SessionState::Disconnected || !self.transport.is_open() {
            info!("Session to {} is down, reconnecting", self.config.host);
            self.establish().await?;
        }

        debug!("Sending {:?} to {}", shown, self.config.host);
        let first = match self.exchange(command, options).await {
            Ok(output) => return Ok(output),
            Err(TransportError::Timeout(waited)) => return Err(self.timed_out(shown, options, waited)),
            Err(e) => e,
        };

        warn!(
            "Command {:?} on {} hit {}; reconnecting and retrying once",
            shown, self.config.host, first
        );
        self.teardown().await;
        self.establish().await?;

        match self.exchange(command, options).await {
            Ok(output) => Ok(output),
            Err(TransportError::Timeout(waited)) => Err(self.timed_out(shown, options, waited)),
            Err(e) => {
                self.teardown().await;
                Err(Error::command(shown, e))
            }
        }
    }

    /// Send commands in order, stopping at the first failure.
    pub async fn send_commands<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            outputs.push(self.send_command(command.as_ref()).await?);
        }
        Ok(outputs)
    }

    /// Run `commands` inside the vendor's configuration mode.
    ///
    /// Returns the outputs of `commands` only. If one of them fails on a
    /// session that is still up, the exit command is attempted before the
    /// error is returned.
    pub async fn send_config_commands<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        enter: &str,
        exit: &str,
    ) -> Result<Vec<String>> {
        self.send_config_commands_with(commands, enter, exit, &CommandOptions::default())
            .await
    }

    /// [`send_config_commands`](Self::send_config_commands) with `options`
    /// applied to each of `commands` (not to `enter` and `exit`).
    pub async fn send_config_commands_with<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        enter: &str,
        exit: &str,
        options: &CommandOptions,
    ) -> Result<Vec<String>> {
        self.send_command(enter).await?;

        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            match self.send_command_with(command.as_ref(), options).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    // a torn-down session reconnects outside config mode
                    if self.state == SessionState::Disconnected {
                        return Err(e);
                    }
                    if let Err(exit_error) = self.send_command(exit).await {
                        debug!("Leaving config mode on {} failed: {}", self.config.host, exit_error);
                    }
                    return Err(e);
                }
            }
        }

        self.send_command(exit).await?;
        Ok(outputs)
    }

    /// [`send_command`](Self::send_command), returning the cleaned view too.
    pub async fn run(&mut self, command: &str) -> Result<CommandResult> {
        self.run_with(command, &CommandOptions::default()).await
    }

    pub async fn run_with(&mut self, command: &str, options: &CommandOptions) -> Result<CommandResult> {
        let started = Instant::now();
        let raw = self.send_command_with(command, options).await?;
        let prompt = self.prompt.clone().unwrap_or_default();
        Ok(CommandResult::new(command, raw, prompt, started.elapsed()))
    }

    /// Open the transport, capture the prompt and run the setup commands.
    async fn establish(&mut self) -> std::result::Result<(), TransportError> {
        self.state = SessionState::Connecting;
        self.prompt = None;
        self.buffer.clear();

        if let Err(e) = self.transport.open().await {
            self.state = SessionState::Disconnected;
            return Err(e);
        }

        match self.detect_prompt().await {
            Ok(()) => {}
            Err(e) => {
                self.teardown().await;
                return Err(e);
            }
        }
        self.state = SessionState::Connected;

        let setup = self.config.on_open_commands.clone();
        for command in &setup {
            trace!("Session setup on {}: {}", self.config.host, command);
            if let Err(e) = self.exchange(command, &CommandOptions::default()).await {
                self.teardown().await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn detect_prompt(&mut self) -> std::result::Result<(), TransportError> {
        let deadline = Instant::now() + self.config.timeout;
        self.drain(deadline).await?;

        if self.buffer.last_line().is_none() {
            let line_ending = self.config.line_ending.clone();
            self.transport.write(line_ending.as_bytes()).await?;
            self.drain(deadline).await?;
        }

        self.prompt = self
            .buffer
            .last_line()
            .map(|line| parser::clean_output(&line))
            .filter(|line| !line.is_empty());
        self.buffer.clear();
        debug!("Detected prompt {:?} on {}", self.prompt, self.config.host);
        Ok(())
    }

    /// One write/read cycle. `Timeout` means the expect marker never showed.
    async fn exchange(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> std::result::Result<String, TransportError> {
        self.state = SessionState::Busy;
        self.discard_stale().await?;

        let started = Instant::now();
        let max_wait = options.max_wait.unwrap_or(self.config.command_timeout);
        let deadline = started + max_wait;

        let line = format!("{}{}", command, self.config.line_ending);
        self.transport.write(line.as_bytes()).await?;

        match options.expect {
            Some(ref expect) => {
                while !self.buffer.tail_matches(expect) {
                    let now = Instant::now();
                    if now >= deadline {
                        self.state = SessionState::Connected;
                        return Err(TransportError::Timeout(max_wait));
                    }
                    if let Some(chunk) = self.transport.read(deadline - now).await? {
                        self.buffer.extend(&chunk);
                    }
                }
            }
            None => {
                let delay = options.wait_time.unwrap_or(self.config.command_delay);
                tokio::time::sleep(delay.min(max_wait)).await;
                self.drain(deadline).await?;
            }
        }

        let output = self.buffer.take_string();
        self.remember_prompt(&output);
        self.state = SessionState::Connected;
        Ok(output)
    }

    /// Read until the line has been idle for `drain_idle` or `deadline` passes.
    async fn drain(&mut self, deadline: Instant) -> std::result::Result<(), TransportError> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let window = self.config.drain_idle.min(deadline - now);
            match self.transport.read(window).await? {
                Some(chunk) => self.buffer.extend(&chunk),
                None => return Ok(()),
            }
        }
    }

    async fn discard_stale(&mut self) -> std::result::Result<(), TransportError> {
        while let Some(stale) = self.transport.read(STALE_WINDOW).await? {
            trace!("Discarding {} stale bytes from {}", stale.len(), self.config.host);
        }
        self.buffer.clear();
        Ok(())
    }

    fn remember_prompt(&mut self, output: &str) {
        let cleaned = parser::clean_output(output);
        if let Some(last) = cleaned.lines().last().map(str::trim) {
            if PROMPT_SHAPE.is_match(last) {
                self.prompt = Some(last.to_string());
            }
        }
    }

    fn timed_out(&self, command: &str, options: &CommandOptions, waited: Duration) -> Error {
        let marker = options
            .expect
            .as_ref()
            .map(|expect| expect.as_str())
            .unwrap_or("");
        Error::command(
            command,
            format!("{:?} not seen within {:?}", marker, waited),
        )
    }

    async fn teardown(&mut self) {
        self.transport.close().await;
        self.state = SessionState::Disconnected;
        self.prompt = None;
        self.buffer.clear();
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("protocol", &self.config.protocol)
            .field("state", &self.state)
            .field("prompt", &self.prompt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Expect;
    use crate::error::ErrorKind;
    use crate::testing::{MockTransport, test_config};

    fn session(prompt: &str) -> (TransportSession, crate::testing::MockHandle) {
        let (transport, handle) = MockTransport::new(prompt);
        (
            TransportSession::with_transport(test_config(), Box::new(transport)),
            handle,
        )
    }

    #[tokio::test]
    async fn test_connect_detects_prompt() {
        let (mut session, handle) = session("MA5800-X7#");
        assert_eq!(session.state(), SessionState::Disconnected);

        assert!(session.connect().await);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.prompt(), Some("MA5800-X7#"));
        assert_eq!(handle.opens(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_returns_false() {
        let (mut session, handle) = session("ZXAN#");
        handle.fail_next_opens(1);

        assert!(!session.connect().await);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_on_open_commands_run_after_every_connect() {
        let (transport, handle) = MockTransport::new("ZXAN#");
        let config = test_config().with_on_open_command("terminal length 0");
        let mut session = TransportSession::with_transport(config, Box::new(transport));

        assert!(session.connect().await);
        session.disconnect().await;
        assert!(session.connect().await);
        assert_eq!(handle.count_sent("terminal length 0"), 2);
    }

    #[tokio::test]
    async fn test_send_command_returns_raw_output() {
        let (mut session, handle) = session("ZXAN#");
        handle.respond("show clock", "10:02:11 UTC Mon Oct 19 2026");
        assert!(session.connect().await);

        let output = session.send_command("show clock").await.unwrap();
        assert!(output.contains("10:02:11 UTC"));
        assert!(output.trim_end().ends_with("ZXAN#"));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_send_command_reconnects_when_disconnected() {
        let (mut session, handle) = session("ZXAN#");
        handle.respond("show clock", "10:02:11");

        let output = session.send_command("show clock").await.unwrap();
        assert!(output.contains("10:02:11"));
        assert_eq!(handle.opens(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_connection_error() {
        let (mut session, handle) = session("ZXAN#");
        handle.fail_next_opens(1);

        let err = session.send_command("show clock").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(handle.count_sent("show clock"), 0);
    }

    #[tokio::test]
    async fn test_single_transport_failure_is_retried_once() {
        let (mut session, handle) = session("MA5800#");
        handle.respond("display version", "VERSION : MA5800V100R019");
        assert!(session.connect().await);

        handle.fail_next_writes(1);
        let output = session.send_command("display version").await.unwrap();

        assert!(output.contains("MA5800V100R019"));
        assert_eq!(handle.opens(), 2);
        assert_eq!(handle.count_sent("display version"), 2);
    }

    #[tokio::test]
    async fn test_persistent_transport_failure_retries_exactly_once() {
        let (mut session, handle) = session("MA5800#");
        assert!(session.connect().await);

        handle.fail_next_writes(usize::MAX);
        let err = session.send_command("display version").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(handle.opens(), 2);
        assert_eq!(handle.count_sent("display version"), 2);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_expect_timeout_is_not_retried() {
        let (mut session, handle) = session("MA5800#");
        handle.respond("display ont info 0 1 0 3", "  ONT-ID  : 3");
        assert!(session.connect().await);

        let options = CommandOptions::expecting(Expect::literal("(y/n)"))
            .with_max_wait(Duration::from_millis(100));
        let err = session
            .send_command_with("display ont info 0 1 0 3", &options)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Command);
        assert!(err.to_string().contains("(y/n)"));
        assert_eq!(handle.opens(), 1);
        assert_eq!(handle.count_sent("display ont info 0 1 0 3"), 1);
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_expect_stops_at_marker() {
        let (mut session, handle) = session("MA5800(config-if-gpon-0/1)#");
        handle.respond_without_prompt("ont reset 0 3", "  Are you sure to reset the ONT(s)? (y/n)[n]:");
        handle.respond("y", "");
        assert!(session.connect().await);

        let options = CommandOptions::expecting(Expect::literal("(y/n)"));
        let output = session.send_command_with("ont reset 0 3", &options).await.unwrap();
        assert!(output.contains("(y/n)"));

        session.send_command("y").await.unwrap();
        assert_eq!(session.prompt(), Some("MA5800(config-if-gpon-0/1)#"));
    }

    #[tokio::test]
    async fn test_send_commands_stops_at_first_error() {
        let (mut session, handle) = session("ZXAN#");
        assert!(session.connect().await);

        let outputs = session.send_commands(&["show clock", "show version"]).await.unwrap();
        assert_eq!(outputs.len(), 2);

        handle.fail_next_opens(1);
        handle.fail_next_writes(1);
        let err = session.send_commands(&["show clock", "show version"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(handle.count_sent("show version"), 1);
    }

    #[tokio::test]
    async fn test_config_commands_are_wrapped() {
        let (mut session, handle) = session("ZXAN#");
        handle.respond("vlan 100", "");
        assert!(session.connect().await);

        let outputs = session
            .send_config_commands(&["vlan 100", "name internet"], "configure terminal", "end")
            .await
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(
            handle.sent(),
            vec!["configure terminal", "vlan 100", "name internet", "end"]
        );
    }

    #[tokio::test]
    async fn test_config_exit_is_attempted_after_failure() {
        let (mut session, handle) = session("ZXAN#");
        assert!(session.connect().await);

        let options = CommandOptions::expecting(Expect::literal("[yes/no]"))
            .with_max_wait(Duration::from_millis(100));
        let err = session
            .send_config_commands_with(&["vlan 100", "name internet"], "configure terminal", "end", &options)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(handle.count_sent("name internet"), 0);
        assert_eq!(handle.sent().last().map(String::as_str), Some("end"));
    }

    #[tokio::test]
    async fn test_config_exit_skipped_after_teardown() {
        let (mut session, handle) = session("ZXAN#");
        assert!(session.connect().await);

        handle.fail_on("vlan 100");
        let err = session
            .send_config_commands(&["vlan 100", "name internet"], "configure terminal", "end")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(handle.count_sent("vlan 100"), 2);
        assert_eq!(handle.count_sent("end"), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_is_connected_probe() {
        let (mut session, handle) = session("ZXAN#");
        assert!(!session.is_connected().await);

        assert!(session.connect().await);
        assert!(session.is_connected().await);

        handle.fail_next_writes(1);
        assert!(!session.is_connected().await);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut session, _handle) = session("ZXAN#");
        assert!(session.connect().await);
        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.prompt(), None);
    }

    #[tokio::test]
    async fn test_run_cleans_output() {
        let (mut session, handle) = session("MA5800#");
        handle.respond("display version", "  VERSION : MA5800V100R019\r\n  PATCH   : SPC100");
        assert!(session.connect().await);

        let result = session.run("display version").await.unwrap();
        assert_eq!(result.output, "  VERSION : MA5800V100R019\n  PATCH  : SPC100");
        assert_eq!(result.prompt, "MA5800#");
    }
}
