//! Result of one command exchange.

use std::time::Duration;

use indexmap::IndexMap;

use crate::parser::{self, Table};

/// Output of a command, raw and cleaned.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The command that was executed.
    pub command: String,

    /// Everything the device printed, untouched.
    pub raw: String,

    /// Output after [`parser::clean_output`], with the command echo and the
    /// trailing prompt removed.
    pub output: String,

    /// The prompt that closed the output.
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,
}

impl CommandResult {
    pub fn new(
        command: impl Into<String>,
        raw: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let command = command.into();
        let raw = raw.into();
        let prompt = prompt.into();
        let output = strip_echo_and_prompt(&parser::clean_output(&raw), &command, &prompt);
        Self {
            command,
            raw,
            output,
            prompt,
            elapsed,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }

    /// Table view of the output, headers inferred from the first line.
    pub fn table(&self) -> Table {
        parser::extract_table(&self.output, None, None, None)
    }

    /// `key<separator>value` view of the output.
    pub fn key_values(&self, separator: &str) -> IndexMap<String, String> {
        parser::extract_key_value_pairs(&self.output, separator)
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.output)
    }
}

fn strip_echo_and_prompt(cleaned: &str, command: &str, prompt: &str) -> String {
    let mut lines: Vec<&str> = cleaned.lines().collect();

    let command = command.trim();
    if !command.is_empty() && lines.first().is_some_and(|line| line.contains(command)) {
        lines.remove(0);
    }

    let prompt = prompt.trim();
    if !prompt.is_empty() && lines.last().is_some_and(|line| line.trim() == prompt) {
        lines.pop();
    }

    lines.join("\n")
}
