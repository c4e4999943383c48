//! Modern CLI policy.
//!
//! Steers `grep`, `find`, `cat` and `ls` towards `rg`, `fd`, `bat` and `eza`,
//! but only when the replacement is actually installed. A legacy tool counts
//! only as the command word of a segment; `echo grep` or `rg cat` do not.

use super::{EvalContext, PolicyInput, PolicyMatch};
use crate::shell::command_words;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

pub const POLICY_ID: &str = "modern_cli";

/// A legacy tool and the modern tool to use instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReplacement {
    pub legacy: String,
    pub modern: String,
}

impl ToolReplacement {
    #[must_use]
    pub fn new(legacy: impl Into<String>, modern: impl Into<String>) -> Self {
        Self {
            legacy: legacy.into(),
            modern: modern.into(),
        }
    }

    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("grep", "rg"),
            Self::new("find", "fd"),
            Self::new("cat", "bat"),
            Self::new("ls", "eza"),
        ]
    }
}

/// Answers "is this tool installed?".
pub trait ToolLocator {
    fn is_available(&self, tool: &str) -> bool;
}

/// Looks tools up on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPath;

impl ToolLocator for SystemPath {
    fn is_available(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }
}

/// A fixed set of installed tools.
#[derive(Debug, Clone, Default)]
pub struct FixedTools(HashSet<String>);

impl FixedTools {
    #[must_use]
    pub fn new<I>(tools: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self(tools.into_iter().map(Into::into).collect())
    }
}

impl ToolLocator for FixedTools {
    fn is_available(&self, tool: &str) -> bool {
        self.0.contains(tool)
    }
}

pub(super) fn check(input: &PolicyInput<'_>, ctx: &EvalContext) -> Option<PolicyMatch> {
    let words = command_words(input.command);
    if words.is_empty() {
        return None;
    }

    let hits: Vec<&ToolReplacement> = ctx
        .replacements()
        .iter()
        .filter(|r| words.contains(&r.legacy.as_str()))
        .filter(|r| ctx.tools().is_available(&r.modern))
        .collect();
    if hits.is_empty() {
        return None;
    }

    let mut hint = String::new();
    for (i, r) in hits.iter().enumerate() {
        if i > 0 {
            hint.push('\n');
        }
        let _ = write!(hint, "USE '{}' instead '{}'", r.modern, r.legacy);
    }

    Some(PolicyMatch {
        policy_id: POLICY_ID,
        reason: "Legacy CLI blocked".to_string(),
        message: format!("Legacy CLI blocked.\n{hint}"),
        suggestion: Some(hint),
        reason_owner: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(installed: &[&str]) -> EvalContext {
        EvalContext::new("/nonexistent").with_tools(FixedTools::new(installed.iter().copied()))
    }

    fn run(command: &str, installed: &[&str]) -> Option<PolicyMatch> {
        check(
            &PolicyInput {
                tool_name: "Bash",
                command,
            },
            &ctx(installed),
        )
    }

    #[test]
    fn blocks_legacy_tool_when_modern_installed() {
        let m = run("grep -r TODO src", &["rg"]).expect("should block");
        assert_eq!(m.message, "Legacy CLI blocked.\nUSE 'rg' instead 'grep'");
        assert_eq!(m.suggestion.as_deref(), Some("USE 'rg' instead 'grep'"));
    }

    #[test]
    fn allows_legacy_tool_when_modern_missing() {
        assert!(run("grep -r TODO src", &[]).is_none());
        assert!(run("cat README.md", &["rg", "fd"]).is_none());
    }

    #[test]
    fn checks_every_segment() {
        let m = run("ls -la | grep foo && cat x", &["rg", "bat", "eza"]).unwrap();
        assert_eq!(
            m.suggestion.as_deref(),
            Some("USE 'rg' instead 'grep'\nUSE 'bat' instead 'cat'\nUSE 'eza' instead 'ls'")
        );
    }

    #[test]
    fn arguments_are_not_command_words() {
        let installed = ["rg", "fd", "bat", "eza"];
        assert!(run("echo grep cat ls find", &installed).is_none());
        assert!(run("rg cat", &installed).is_none());
        assert!(run("git log --grep fix", &installed).is_none());
        assert!(run(r#"echo "a | grep b""#, &installed).is_none());
    }

    #[test]
    fn custom_replacements() {
        let ctx = EvalContext::new("/nonexistent")
            .with_replacements(vec![ToolReplacement::new("du", "dust")])
            .with_tools(FixedTools::new(["dust", "rg"]));
        let input = PolicyInput {
            tool_name: "Bash",
            command: "du -sh . ; grep x y",
        };
        let m = check(&input, &ctx).unwrap();
        assert_eq!(m.suggestion.as_deref(), Some("USE 'dust' instead 'du'"));
    }

    #[test]
    fn empty_command_is_allowed() {
        assert!(run("", &["rg"]).is_none());
    }
}
