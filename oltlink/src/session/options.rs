//! Per-command wait options.

use std::time::Duration;

use crate::channel::Expect;

/// How [`TransportSession::send_command_with`](super::TransportSession::send_command_with)
/// decides that a command's output is complete.
///
/// Without `expect`, the session sleeps `wait_time` and then drains output
/// until the line goes idle. With `expect`, it reads until the marker
/// appears. Either way `max_wait` bounds the whole exchange. Unset fields
/// fall back to the session's configured timing.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub wait_time: Option<Duration>,
    pub expect: Option<Expect>,
    pub max_wait: Option<Duration>,
    /// Keep the command text out of the logs (it carries a secret).
    pub redact: bool,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `expect` instead of a fixed delay.
    pub fn expecting(expect: Expect) -> Self {
        Self {
            expect: Some(expect),
            ..Self::default()
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = Some(wait_time);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn redacted(mut self) -> Self {
        self.redact = true;
        self
    }
}
