//! GitHub write guard.
//!
//! Keeps `gh` read-only: blocks REST calls with a write method, `gh api`
//! calls whose field flags turn them into POSTs, and the subcommands that
//! create, edit or delete things.

use super::{EvalContext, PolicyInput, PolicyMatch};

pub const POLICY_ID: &str = "github_write";

const WRITE_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

const FIELD_FLAGS: &[&str] = &["-f", "-F", "--field", "--raw-field"];

/// `gh <group> <action>` pairs that modify state.
pub const WRITE_COMMANDS: &[(&str, &str)] = &[
    ("repo", "create"),
    ("repo", "delete"),
    ("repo", "fork"),
    ("repo", "rename"),
    ("repo", "archive"),
    ("issue", "create"),
    ("issue", "edit"),
    ("issue", "close"),
    ("issue", "delete"),
    ("issue", "pin"),
    ("issue", "unpin"),
    ("issue", "transfer"),
    ("pr", "create"),
    ("pr", "edit"),
    ("pr", "close"),
    ("pr", "merge"),
    ("pr", "reopen"),
    ("pr", "ready"),
    ("pr", "comment"),
    ("pr", "review"),
    ("release", "create"),
    ("release", "delete"),
    ("release", "edit"),
    ("release", "upload"),
    ("run", "cancel"),
    ("run", "rerun"),
    ("workflow", "enable"),
    ("workflow", "disable"),
    ("workflow", "run"),
    ("gist", "create"),
    ("gist", "edit"),
    ("gist", "delete"),
    ("project", "create"),
    ("project", "edit"),
    ("project", "delete"),
    ("project", "item-add"),
    ("project", "item-edit"),
    ("project", "item-delete"),
    ("project", "field-create"),
    ("project", "field-delete"),
];

pub(super) fn check(input: &PolicyInput<'_>, _ctx: &EvalContext) -> Option<PolicyMatch> {
    if input.tool_name != "Bash" {
        return None;
    }
    let tokens: Vec<&str> = input.command.split_whitespace().collect();
    if tokens.first() != Some(&"gh") {
        return None;
    }

    let what = match tokens.get(1).copied() {
        Some("api") => api_write(&tokens[2..])?,
        Some(group) => {
            let action = *tokens.get(2)?;
            WRITE_COMMANDS
                .iter()
                .find(|(g, a)| *g == group && *a == action)
                .map(|(g, a)| format!("gh {g} {a}"))?
        }
        None => return None,
    };

    Some(PolicyMatch {
        policy_id: POLICY_ID,
        reason: "GitHub write blocked".to_string(),
        message: format!("GitHub write blocked: {what}"),
        suggestion: None,
        reason_owner: None,
    })
}

/// Describe why a `gh api` call writes, given the tokens after `api`.
fn api_write(args: &[&str]) -> Option<String> {
    let method = request_method(args);
    if let Some(method) = method.as_deref() {
        if WRITE_METHODS.contains(&method) {
            return Some(format!("gh api {method}"));
        }
    }
    let has_fields = args.iter().any(|arg| {
        FIELD_FLAGS.contains(arg)
            || arg.starts_with("-f")
            || arg.starts_with("-F")
            || arg.starts_with("--field=")
            || arg.starts_with("--raw-field=")
    });
    if has_fields && method.as_deref() != Some("GET") {
        return Some("gh api with -f/-F flags (defaults to POST)".to_string());
    }
    None
}

/// Upper-cased value of `-X`/`--method`, in any of its spellings.
///
/// Flag names match case-insensitively, so `-x delete` counts as a method.
fn request_method(args: &[&str]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        let flag = arg.to_ascii_lowercase();
        let value = match flag.as_str() {
            "-x" | "--method" => iter.next().map(|v| v.to_ascii_uppercase()),
            _ => flag
                .strip_prefix("--method=")
                .or_else(|| flag.strip_prefix("-x").filter(|v| !v.is_empty()))
                .map(str::to_ascii_uppercase),
        };
        if value.is_some() {
            return value;
        }
    }
    None
}
