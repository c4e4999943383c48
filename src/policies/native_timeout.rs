//! Native timeout policy.
//!
//! The Bash tool has its own `timeout` parameter, so wrapping a command in
//! `timeout`/`gtimeout` is redundant and hides the limit from the caller.
//! A leading wrapper is blocked with a ready-made `Bash(...)` call; a
//! wrapper inside a chain is blocked with advice to split the chain.

use super::{EvalContext, PolicyInput, PolicyMatch};
use crate::shell::{command_word, split_segments};
use smallvec::SmallVec;

pub const POLICY_ID: &str = "native_timeout";

/// Wrapper executables this policy recognizes.
pub const TIMEOUT_COMMANDS: &[&str] = &["timeout", "gtimeout"];

/// Used when no duration can be read from the command.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Options of `timeout` that take a separate value.
const VALUE_FLAGS: &[&str] = &["-s", "--signal", "-k", "--kill-after"];

/// A parsed leading `timeout` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutInvocation<'a> {
    /// Duration argument as written, if one was found.
    pub duration: Option<&'a str>,
    /// The wrapped command with its original spacing.
    pub inner: &'a str,
}

impl TimeoutInvocation<'_> {
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.duration.and_then(duration_to_ms).unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

pub(super) fn check(input: &PolicyInput<'_>, _ctx: &EvalContext) -> Option<PolicyMatch> {
    if let Some(invocation) = parse_invocation(input.command) {
        let call = format!(
            "Bash(command=\"{}\", timeout={})",
            escape_double_quoted(invocation.inner),
            invocation.timeout_ms()
        );
        return Some(PolicyMatch {
            policy_id: POLICY_ID,
            reason: "Direct timeout blocked".to_string(),
            message: format!("Direct timeout blocked\nUse Bash timeout parameter: {call}"),
            suggestion: Some(call),
            reason_owner: None,
        });
    }

    let segments = split_segments(input.command);
    let chained = segments.len() > 1
        && segments
            .iter()
            .skip(1)
            .filter_map(|segment| command_word(segment))
            .any(is_timeout_command);
    if !chained {
        return None;
    }

    let advice = "Split into separate Bash calls with timeout parameter";
    Some(PolicyMatch {
        policy_id: POLICY_ID,
        reason: "Timeout in command chain blocked".to_string(),
        message: format!("Timeout in command chain blocked\n{advice}"),
        suggestion: Some(advice.to_string()),
        reason_owner: None,
    })
}

fn is_timeout_command(word: &str) -> bool {
    TIMEOUT_COMMANDS.contains(&word)
}

/// Parse `timeout [OPTIONS] DURATION COMMAND...` at the start of `command`.
///
/// Returns `None` unless the first token is a timeout wrapper followed by
/// at least one more token.
#[must_use]
pub fn parse_invocation(command: &str) -> Option<TimeoutInvocation<'_>> {
    let trimmed = command.trim();
    let tokens = token_spans(trimmed);
    let (_, first) = *tokens.first()?;
    if !is_timeout_command(first) || tokens.len() < 2 {
        return None;
    }

    let mut i = 1;
    while i < tokens.len() {
        let (offset, token) = tokens[i];
        if VALUE_FLAGS.contains(&token) {
            i += 2;
            continue;
        }
        if token.starts_with('-') && token.len() > 1 {
            i += 1;
            continue;
        }
        if is_duration(token) {
            let inner = tokens
                .get(i + 1)
                .map_or("", |&(start, _)| trimmed[start..].trim_end());
            return Some(TimeoutInvocation {
                duration: Some(token),
                inner,
            });
        }
        return Some(TimeoutInvocation {
            duration: None,
            inner: trimmed[offset..].trim_end(),
        });
    }

    Some(TimeoutInvocation {
        duration: None,
        inner: "",
    })
}

/// Whitespace-separated tokens with their byte offsets.
fn token_spans(s: &str) -> SmallVec<[(usize, &str); 8]> {
    let mut spans = SmallVec::new();
    let mut start = None;
    for (idx, ch) in s.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(begin)) => {
                spans.push((begin, &s[begin..idx]));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(begin) = start {
        spans.push((begin, &s[begin..]));
    }
    spans
}

fn split_unit(token: &str) -> (&str, u64) {
    match token.as_bytes().last() {
        Some(b's') => (&token[..token.len() - 1], 1_000),
        Some(b'm') => (&token[..token.len() - 1], 60_000),
        Some(b'h') => (&token[..token.len() - 1], 3_600_000),
        Some(b'd') => (&token[..token.len() - 1], 86_400_000),
        _ => (token, 1_000),
    }
}

/// `10`, `10s`, `2m`, `1.5h` and the like.
fn is_duration(token: &str) -> bool {
    let (number, _) = split_unit(token);
    !number.is_empty()
        && number.bytes().any(|b| b.is_ascii_digit())
        && number.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Milliseconds for an integer duration. Fractional values are not
/// converted.
#[must_use]
pub fn duration_to_ms(token: &str) -> Option<u64> {
    let (number, unit) = split_unit(token);
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse::<u64>().ok()?.checked_mul(unit)
}

fn escape_double_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
