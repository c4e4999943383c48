//! Decision log and diagnostic tracing.
//!
//! Two independent channels:
//!
//! * The **decision log**: an opt-in append-only file with one text or JSON
//!   line per evaluated command, with optional redaction.
//! * **Diagnostic tracing**: `tracing` events from the scanner and evaluator,
//!   printed to stderr only when `PTG_TRACE` holds a filter directive. Hook
//!   stderr is otherwise reserved for block messages.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::evaluator::EvaluationResult;

/// Environment variable holding the tracing filter directive.
pub const TRACE_ENV: &str = "PTG_TRACE";

/// Decision log configuration (`[logging]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log file path. `~/` is expanded.
    pub file: Option<String>,
    pub format: LogFormat,
    pub redaction: RedactionConfig,
    pub events: LogEventFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            format: LogFormat::Text,
            redaction: RedactionConfig::default(),
            events: LogEventFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub mode: RedactionMode,
    /// Arguments longer than this are shortened in `arguments` mode.
    pub max_argument_len: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RedactionMode::Arguments,
            max_argument_len: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    None,
    #[default]
    Arguments,
    Full,
}

/// Which decisions are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub block: bool,
    pub allow: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            block: true,
            allow: false,
        }
    }
}

/// One decision log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub decision: &'static str,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub elapsed_us: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub budget_skip: bool,
}

impl LogEntry {
    #[must_use]
    pub fn from_result(
        result: &EvaluationResult,
        command: &str,
        redaction: &RedactionConfig,
    ) -> Self {
        let decision = &result.decision;
        Self {
            timestamp: now_rfc3339(),
            decision: if decision.allow { "allow" } else { "block" },
            command: redact_command(command, redaction),
            policy: decision.policy,
            owner: decision.reason_owner.map(|owner| owner.label()),
            reason: decision.reason.clone(),
            suggestion: decision
                .suggestion
                .as_deref()
                .map(|s| redact_command(s, redaction)),
            elapsed_us: u64::try_from(result.elapsed.as_micros()).unwrap_or(u64::MAX),
            budget_skip: result.skipped_due_to_budget,
        }
    }

    #[must_use]
    pub fn format_text(&self) -> String {
        let mut line = format!(
            "[{}] {} \"{}\"",
            self.timestamp,
            self.decision.to_uppercase(),
            self.command
        );
        if let Some(policy) = self.policy {
            line.push_str(" policy=");
            line.push_str(policy);
        }
        if let Some(owner) = self.owner {
            line.push_str(" owner=");
            line.push_str(owner);
        }
        if let Some(suggestion) = &self.suggestion {
            line.push_str(" -> ");
            line.push_str(&suggestion.replace('\n', "; "));
        }
        line.push_str(&format!(" ({}us)", self.elapsed_us));
        if self.budget_skip {
            line.push_str(" [budget-skip]");
        }
        line
    }

    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Appends decision lines to the configured file.
pub struct DecisionLogger {
    config: LoggingConfig,
    writer: Mutex<BufWriter<File>>,
}

impl std::fmt::Debug for DecisionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DecisionLogger {
    /// Open the log, or `None` when logging is off or the file cannot be
    /// opened.
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let path = expand_tilde(config.file.as_deref()?);
        match open_append(&path) {
            Ok(file) => Some(Self {
                config: config.clone(),
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot open decision log");
                None
            }
        }
    }

    pub fn log(&self, result: &EvaluationResult, command: &str) {
        let wanted = if result.decision.allow {
            self.config.events.allow
        } else {
            self.config.events.block
        };
        if !wanted {
            return;
        }
        let entry = LogEntry::from_result(result, command, &self.config.redaction);
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }
}

/// Install the stderr tracing subscriber if `PTG_TRACE` is set.
///
/// Returns whether a subscriber was installed.
pub fn init_tracing() -> bool {
    let Ok(directive) = std::env::var(TRACE_ENV) else {
        return false;
    };
    let filter = EnvFilter::try_new(directive.trim())
        .unwrap_or_else(|_| EnvFilter::new("project_tool_guard=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Current time as RFC 3339 in UTC, second precision.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest)),
        None => PathBuf::from(path),
    }
}

/// Open `path` for appending, creating parent directories.
///
/// # Errors
///
/// Returns the I/O error from creating the directory or opening the file.
pub fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn redact_command(command: &str, config: &RedactionConfig) -> String {
    if !config.enabled {
        return command.to_string();
    }
    match config.mode {
        RedactionMode::None => command.to_string(),
        RedactionMode::Full => "[REDACTED]".to_string(),
        RedactionMode::Arguments => redact_arguments(command, config.max_argument_len),
    }
}

/// Shorten every space-separated word longer than `max_len` characters.
fn redact_arguments(command: &str, max_len: usize) -> String {
    command
        .split(' ')
        .map(|word| {
            if word.chars().count() > max_len {
                let kept: String = word.chars().take(max_len).collect();
                format!("{kept}...")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
