//! Python package-manager policy.
//!
//! Blocks running the Python runtime directly inside a project that a
//! package manager owns, and suggests the same command through the
//! manager's run-wrapper.
//!
//! | Classification          | owner = None | owner = X                    |
//! |-------------------------|--------------|------------------------------|
//! | Unrelated               | allow        | allow                        |
//! | Bootstrap               | allow        | allow                        |
//! | AlreadyWrapped          | allow        | allow                        |
//! | DirectRuntimeInvocation | allow        | block, suggest `X run ...`   |

use super::{EvalContext, PolicyInput, PolicyMatch};
use crate::classify::Classification;
use crate::project::{ManagerKind, ProjectContext};

pub const POLICY_ID: &str = "python_manager";

/// Registry entry point.
pub(super) fn check(input: &PolicyInput<'_>, ctx: &EvalContext) -> Option<PolicyMatch> {
    let classifier = ctx.classifier();
    if !classifier.might_invoke_runtime(input.command) {
        return None;
    }
    let classification = classifier.classify(input.command);
    if !classification.needs_project_context() {
        return None;
    }
    decide(&classification, ctx.project())
}

/// Apply the decision table to a classification and a scanned project.
///
/// Returns `None` for allow.
#[must_use]
pub fn decide(classification: &Classification<'_>, project: &ProjectContext) -> Option<PolicyMatch> {
    let Classification::DirectRuntimeInvocation { runtime, args } = *classification else {
        return None;
    };
    if project.owner.is_none() {
        return None;
    }
    let wrapper = project.run_wrapper()?;
    let suggestion = suggest(&wrapper, runtime, args);

    Some(PolicyMatch {
        policy_id: POLICY_ID,
        reason: format!("Direct {runtime} blocked"),
        message: block_message(runtime, project, &suggestion),
        suggestion: Some(suggestion),
        reason_owner: Some(project.owner),
    })
}

/// `<wrapper> <runtime> <args>` with the arguments untouched.
#[must_use]
pub fn suggest(wrapper: &str, runtime: &str, args: &str) -> String {
    if args.is_empty() {
        format!("{wrapper} {runtime}")
    } else {
        format!("{wrapper} {runtime} {args}")
    }
}

fn block_message(runtime: &str, project: &ProjectContext, suggestion: &str) -> String {
    let mut message = format!(
        "Direct {runtime} blocked. Project uses {}: {suggestion}",
        project.owner
    );
    if let Some(signal) = project.owner_signals().next() {
        message.push_str(&format!("\nDetected from {}.", signal.source));
    }
    if project.owner == ManagerKind::CondaOrMamba && suggestion.contains("<env_name>") {
        message.push_str("\nReplace <env_name> with the project's conda environment.");
    }
    message
}
