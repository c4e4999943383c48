//! Hook protocol handling.
//!
//! The calling agent runtime spawns `ptg` once per tool call, writes one
//! JSON object to stdin and reads the exit status:
//!
//! ```json
//! { "tool_name": "Bash", "tool_input": { "command": "python app.py" } }
//! ```
//!
//! Exit status `0` allows the call. Status `2` blocks it and the runtime
//! shows stderr to the agent.

use crate::evaluator::{CommandRequest, Decision};
use crate::logging::{expand_tilde, now_rfc3339, open_append};
use colored::Colorize;
use serde::Deserialize;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit status for allow.
pub const EXIT_ALLOW: i32 = 0;

/// Exit status for a policy violation.
pub const EXIT_BLOCK: i32 = 2;

/// Environment variable naming the project root to scan.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Input from the hook runtime.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    /// The tool being invoked (e.g. "Bash").
    pub tool_name: Option<String>,
    pub tool_input: Option<ToolInput>,
}

/// Tool-specific parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ToolInput {
    /// The command string (Bash). Any other JSON type counts as empty.
    pub command: Option<serde_json::Value>,
}

impl HookInput {
    /// The command text, or an empty string when absent or not a string.
    #[must_use]
    pub fn command(&self) -> &str {
        match self.tool_input.as_ref().and_then(|t| t.command.as_ref()) {
            Some(serde_json::Value::String(s)) => s,
            _ => "",
        }
    }

    #[must_use]
    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or_default()
    }

    /// Build the request, taking the project root from `root_override`.
    #[must_use]
    pub fn into_request(self, root_override: Option<PathBuf>) -> CommandRequest {
        let command = self.command().to_string();
        CommandRequest::new(self.tool_name.unwrap_or_default(), command)
            .with_cwd_override(root_override)
    }
}

#[derive(Debug, Error)]
pub enum HookReadError {
    #[error("failed to read hook input: {0}")]
    Io(#[from] io::Error),
    #[error("hook input is {0} bytes, over the configured limit")]
    InputTooLarge(usize),
    #[error("hook input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read and parse hook input from stdin.
///
/// # Errors
///
/// See [`parse_hook_input`].
pub fn read_hook_input(max_bytes: usize) -> Result<HookInput, HookReadError> {
    parse_hook_input(io::stdin().lock(), max_bytes)
}

/// Read at most `max_bytes` from `reader` and parse them as hook input.
///
/// # Errors
///
/// Returns [`HookReadError::Io`] if reading fails,
/// [`HookReadError::InputTooLarge`] past `max_bytes`, or
/// [`HookReadError::Json`] for malformed input.
pub fn parse_hook_input(reader: impl Read, max_bytes: usize) -> Result<HookInput, HookReadError> {
    let mut input = String::with_capacity(256);
    // One extra byte tells "exactly at the limit" from "over it".
    reader
        .take(max_bytes as u64 + 1)
        .read_to_string(&mut input)?;
    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge(input.len()));
    }
    Ok(serde_json::from_str(&input)?)
}

/// Project root from [`PROJECT_DIR_ENV`], if set and non-empty.
#[must_use]
pub fn project_root_override() -> Option<PathBuf> {
    std::env::var_os(PROJECT_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Disable colors when stderr is not a terminal.
pub fn configure_colors() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Plain-text block message.
#[must_use]
pub fn format_block_message(decision: &Decision) -> String {
    let message = decision
        .message
        .as_deref()
        .or(decision.reason.as_deref())
        .unwrap_or("Command blocked");
    format!("❌ {message}")
}

/// Write the block message to stderr, with color on a terminal.
#[cold]
#[inline(never)]
pub fn print_block_message(decision: &Decision) {
    let text = format_block_message(decision);
    let mut lines = text.lines();
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    if let Some(head) = lines.next() {
        let _ = writeln!(handle, "{}", head.red().bold());
    }
    for line in lines {
        let _ = writeln!(handle, "{line}");
    }
    if let Some(policy) = decision.policy {
        let _ = writeln!(handle, "{}", format!("(policy: {policy})").bright_black());
    }
}

/// Append a blocked command to `log_file`.
///
/// # Errors
///
/// Returns any I/O error from creating the directory or writing the file.
pub fn log_blocked_command(log_file: &str, command: &str, decision: &Decision) -> io::Result<()> {
    let mut file = open_append(&expand_tilde(log_file))?;
    let policy = decision.policy.unwrap_or("unknown");
    let reason = decision.reason.as_deref().unwrap_or("blocked");
    writeln!(file, "[{}] [{policy}] {reason}", now_rfc3339())?;
    writeln!(file, "  Command: {command}")?;
    if let Some(suggestion) = &decision.suggestion {
        writeln!(file, "  Suggestion: {}", suggestion.replace('\n', "; "))?;
    }
    writeln!(file)
}

/// Append a budget skip to `log_file`.
///
/// # Errors
///
/// Returns any I/O error from creating the directory or writing the file.
pub fn log_budget_skip(
    log_file: &str,
    command: &str,
    elapsed: Duration,
    budget: Duration,
) -> io::Result<()> {
    let mut file = open_append(&expand_tilde(log_file))?;
    writeln!(file, "[{}] [budget] evaluation skipped", now_rfc3339())?;
    writeln!(
        file,
        "  Budget: {}ms, Elapsed: {}ms",
        budget.as_millis(),
        elapsed.as_millis()
    )?;
    writeln!(file, "  Command: {command}")?;
    writeln!(file)
}
