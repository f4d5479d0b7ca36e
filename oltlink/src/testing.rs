//! Scripted in-memory transport for tests.
//!
//! The mock echoes every command, prints the scripted response for it and
//! then the prompt, the way a device shell does. Failures can be injected
//! on open and on write.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::TransportError;
use crate::transport::{SessionConfig, Transport};

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    opens: usize,
    failing_opens: usize,
    failing_writes: usize,
    failing_commands: Vec<String>,
    sent: Vec<String>,
    outbox: VecDeque<Vec<u8>>,
    /// (command prefix, output, print prompt afterwards)
    responses: Vec<(String, String, bool)>,
}

/// Test-side handle onto a [`MockTransport`].
#[derive(Debug, Clone)]
pub(crate) struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Answer commands starting with `command` with `output`. Later
    /// registrations win over earlier ones.
    pub(crate) fn respond(&self, command: &str, output: &str) {
        self.lock()
            .responses
            .push((command.to_string(), output.to_string(), true));
    }

    /// Like [`respond`](Self::respond) but leave the device waiting for
    /// input instead of printing the prompt.
    pub(crate) fn respond_without_prompt(&self, command: &str, output: &str) {
        self.lock()
            .responses
            .push((command.to_string(), output.to_string(), false));
    }

    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.lock().failing_opens = count;
    }

    pub(crate) fn fail_next_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Drop the connection every time `command` is written.
    pub(crate) fn fail_on(&self, command: &str) {
        self.lock().failing_commands.push(command.to_string());
    }

    pub(crate) fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Non-empty lines written so far.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub(crate) fn count_sent(&self, command: &str) -> usize {
        self.lock().sent.iter().filter(|line| *line == command).count()
    }

    pub(crate) fn sent_containing(&self, fragment: &str) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|line| line.contains(fragment))
            .cloned()
            .collect()
    }
}

/// In-memory device shell.
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
    prompt: String,
}

impl MockTransport {
    pub(crate) fn new(prompt: &str) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
                prompt: prompt.to_string(),
            },
            MockHandle { state },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(TransportError::Timeout(Duration::from_secs(1)));
        }
        state.open = true;
        state.outbox.clear();
        state
            .outbox
            .push_back(format!("\r\nWelcome to the mock OLT\r\n\r\n{}", self.prompt).into_bytes());
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.outbox.clear();
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotConnected);
        }

        let line = String::from_utf8_lossy(data).trim_end().to_string();
        if !line.is_empty() {
            state.sent.push(line.clone());
        }

        if state.failing_writes > 0 || state.failing_commands.contains(&line) {
            state.failing_writes = state.failing_writes.saturating_sub(1);
            state.open = false;
            state.outbox.clear();
            return Err(TransportError::Disconnected);
        }

        let reply = if line.is_empty() {
            format!("\r\n{}", self.prompt)
        } else {
            let scripted = state
                .responses
                .iter()
                .rev()
                .find(|(command, _, _)| line.starts_with(command.as_str()))
                .map(|(_, output, prompt)| (output.clone(), *prompt));
            match scripted {
                Some((output, false)) => format!("{}\r\n{}", line, output),
                Some((output, true)) if !output.is_empty() => {
                    format!("{}\r\n{}\r\n{}", line, output, self.prompt)
                }
                _ => format!("{}\r\n{}", line, self.prompt),
            }
        };
        state.outbox.push_back(reply.into_bytes());
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.open {
                return Err(TransportError::Disconnected);
            }
            if let Some(chunk) = state.outbox.pop_front() {
                return Ok(Some(chunk));
            }
        }
        tokio::time::sleep(timeout.min(Duration::from_millis(5))).await;
        Ok(None)
    }
}

/// Session timing short enough for tests.
pub(crate) fn test_config() -> SessionConfig {
    SessionConfig::new("192.0.2.10", "admin", SecretString::from("secret"))
        .with_timeout(Duration::from_secs(2))
        .with_command_timing(Duration::from_millis(5), Duration::from_secs(2))
        .with_drain_idle(Duration::from_millis(30))
        .with_probe_window(Duration::from_millis(100))
}
