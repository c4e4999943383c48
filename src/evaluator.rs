//! Shared request evaluator for hook mode and the CLI.
//!
//! Hook mode and `ptg test` both go through [`evaluate_with_deadline`], so
//! the two can never disagree about a command.
//!
//! # Pipeline
//!
//! 1. **Empty command** - allowed without further work.
//! 2. **Policies** - each enabled policy runs in registry order. Its keyword
//!    gate is checked first; the project directory is scanned only if a
//!    policy asks for it (the Python policy does so only for a direct
//!    runtime invocation).
//! 3. **First block wins** - the first [`PolicyMatch`] becomes the
//!    [`Decision`]; otherwise the command is allowed.
//! 4. **Deadline** - if the budget runs out, the request is allowed.
//!
//! Evaluation is a pure function of the request and the directory contents:
//! nothing is cached between requests.

use crate::classify::Classification;
use crate::perf::Deadline;
use crate::policies::{EvalContext, PolicyInput, PolicyMatch, python_manager};
use crate::project::{ManagerKind, ProjectContext};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One intercepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub tool_name: String,
    pub raw_command: String,
    /// Project root supplied by the caller; the working directory is used
    /// when absent.
    pub cwd_override: Option<PathBuf>,
}

impl CommandRequest {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, raw_command: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            raw_command: raw_command.into(),
            cwd_override: None,
        }
    }

    #[must_use]
    pub fn with_cwd_override(mut self, root: Option<PathBuf>) -> Self {
        self.cwd_override = root;
        self
    }

    /// Directory to scan for manager markers.
    #[must_use]
    pub fn effective_root(&self) -> PathBuf {
        self.cwd_override.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }
}

/// The verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allow: bool,
    /// Rewritten command or hint shown on block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Manager whose ownership caused the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_owner: Option<ManagerKind>,
    /// Policy that blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<&'static str>,
    /// Short headline of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Full explanation for stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Decision {
    #[inline]
    #[must_use]
    pub const fn allowed() -> Self {
        Self {
            allow: true,
            suggestion: None,
            reason_owner: None,
            policy: None,
            reason: None,
            message: None,
        }
    }

    #[must_use]
    pub fn blocked(m: PolicyMatch) -> Self {
        Self {
            allow: false,
            suggestion: m.suggestion,
            reason_owner: m.reason_owner,
            policy: Some(m.policy_id),
            reason: Some(m.reason),
            message: Some(m.message),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        !self.allow
    }
}

/// Decision plus diagnostics.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub decision: Decision,
    /// The deadline ran out and the request was allowed unchecked.
    pub skipped_due_to_budget: bool,
    /// The scanned project, when some policy needed it.
    pub project: Option<ProjectContext>,
    pub elapsed: Duration,
}

/// Apply the Python decision table.
#[must_use]
pub fn decide(classification: &Classification<'_>, project: &ProjectContext) -> Decision {
    python_manager::decide(classification, project).map_or_else(Decision::allowed, Decision::blocked)
}

/// Evaluate `request` against the enabled policies of `ctx`.
///
/// `ctx` must have been built for `request.effective_root()`.
#[must_use]
pub fn evaluate_request(request: &CommandRequest, ctx: &EvalContext) -> Decision {
    run_policies(request, ctx, None).0
}

/// Like [`evaluate_request`] with a wall-clock budget, consuming the
/// context to report what was scanned.
#[must_use]
pub fn evaluate_with_deadline(
    request: &CommandRequest,
    ctx: EvalContext,
    deadline: Option<&Deadline>,
) -> EvaluationResult {
    let started = Instant::now();
    let (decision, skipped_due_to_budget) = run_policies(request, &ctx, deadline);
    EvaluationResult {
        decision,
        skipped_due_to_budget,
        project: ctx.into_project(),
        elapsed: started.elapsed(),
    }
}

fn run_policies(
    request: &CommandRequest,
    ctx: &EvalContext,
    deadline: Option<&Deadline>,
) -> (Decision, bool) {
    let command = request.raw_command.trim();
    if command.is_empty() {
        return (Decision::allowed(), false);
    }

    let input = PolicyInput {
        tool_name: &request.tool_name,
        command,
    };
    for policy in ctx.policies() {
        let verdict = policy.check(&input, ctx);
        if deadline.is_some_and(Deadline::is_exceeded) {
            tracing::warn!(policy = policy.id, "evaluation budget exceeded, allowing");
            return (Decision::allowed(), true);
        }
        if let Some(m) = verdict {
            tracing::debug!(policy = m.policy_id, reason = %m.reason, "blocked");
            return (Decision::blocked(m), false);
        }
    }
    (Decision::allowed(), false)
}
