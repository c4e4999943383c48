//! Policy registry.
//!
//! A policy is one enforcement rule family: a quick-reject keyword list and a
//! check function that either stays silent or returns a [`PolicyMatch`].
//! Policies are plain data so the registry is a `static` table; enabling and
//! disabling them is done through configuration.
//!
//! | id               | Blocks                                              | Default |
//! |------------------|-----------------------------------------------------|---------|
//! | `python_manager` | direct `python`/`python3` in a managed project      | on      |
//! | `modern_cli`     | `grep`/`find`/`cat`/`ls` when a modern tool exists  | off     |
//! | `native_timeout` | `timeout`/`gtimeout` instead of the Bash timeout    | off     |
//! | `github_write`   | `gh` commands that write to GitHub                  | off     |

pub mod github_write;
pub mod modern_cli;
pub mod native_timeout;
pub mod python_manager;

use crate::classify::Classifier;
use crate::project::{ManagerKind, ProjectContext};
use memchr::memmem;
use std::cell::OnceCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use modern_cli::{FixedTools, SystemPath, ToolLocator, ToolReplacement};

/// What a policy sees of the request.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub tool_name: &'a str,
    pub command: &'a str,
}

/// A policy's verdict when it decides to block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMatch {
    /// Id of the policy that matched.
    pub policy_id: &'static str,
    /// One-line headline, e.g. "Direct python blocked".
    pub reason: String,
    /// Actionable replacement (a rewritten command or a hint).
    pub suggestion: Option<String>,
    /// Manager whose ownership motivated the block.
    pub reason_owner: Option<ManagerKind>,
    /// Full human-readable explanation written to stderr.
    pub message: String,
}

/// Shared, lazily filled evaluation state for one request.
///
/// The project directory is scanned at most once, and only when a policy
/// asks for it.
pub struct EvalContext {
    root: PathBuf,
    policies: Vec<&'static Policy>,
    classifier: Classifier,
    replacements: Vec<ToolReplacement>,
    tools: Box<dyn ToolLocator>,
    project: OnceCell<ProjectContext>,
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let policies: Vec<&str> = self.policies.iter().map(|p| p.id).collect();
        f.debug_struct("EvalContext")
            .field("root", &self.root)
            .field("policies", &policies)
            .field("classifier", &self.classifier)
            .field("replacements", &self.replacements)
            .field("project", &self.project.get())
            .finish_non_exhaustive()
    }
}

impl EvalContext {
    /// Context with the default policies and settings, looking up tools on
    /// `PATH`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policies: REGISTRY.enabled(&REGISTRY.default_ids()),
            classifier: Classifier::default(),
            replacements: ToolReplacement::defaults(),
            tools: Box::new(SystemPath),
            project: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_policies(mut self, policies: Vec<&'static Policy>) -> Self {
        self.policies = policies;
        self
    }

    /// Enabled policies, in evaluation order.
    #[must_use]
    pub fn policies(&self) -> &[&'static Policy] {
        &self.policies
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_replacements(mut self, replacements: Vec<ToolReplacement>) -> Self {
        self.replacements = replacements;
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: impl ToolLocator + 'static) -> Self {
        self.tools = Box::new(tools);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn replacements(&self) -> &[ToolReplacement] {
        &self.replacements
    }

    #[must_use]
    pub fn tools(&self) -> &dyn ToolLocator {
        self.tools.as_ref()
    }

    /// Project context, scanned on first use.
    pub fn project(&self) -> &ProjectContext {
        self.project
            .get_or_init(|| ProjectContext::detect(&self.root))
    }

    /// Project context if some policy already scanned it.
    #[must_use]
    pub fn scanned_project(&self) -> Option<&ProjectContext> {
        self.project.get()
    }

    /// Consume the context, returning the scanned project if any.
    #[must_use]
    pub fn into_project(self) -> Option<ProjectContext> {
        self.project.into_inner()
    }
}

/// Check function signature shared by all policies.
pub type PolicyCheck = fn(&PolicyInput<'_>, &EvalContext) -> Option<PolicyMatch>;

/// One registered policy.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Substrings at least one of which must occur for the policy to run.
    /// Empty means the policy always runs.
    pub keywords: &'static [&'static str],
    pub default_enabled: bool,
    check: PolicyCheck,
}

impl Policy {
    /// Quick keyword gate, no allocation.
    #[inline]
    #[must_use]
    pub fn might_match(&self, command: &str) -> bool {
        self.keywords.is_empty()
            || self
                .keywords
                .iter()
                .any(|kw| memmem::find(command.as_bytes(), kw.as_bytes()).is_some())
    }

    /// Run the policy against one request.
    #[must_use]
    pub fn check(&self, input: &PolicyInput<'_>, ctx: &EvalContext) -> Option<PolicyMatch> {
        if !self.might_match(input.command) {
            return None;
        }
        (self.check)(input, ctx)
    }
}

/// The fixed set of known policies, in evaluation order.
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: &'static [Policy],
}

static POLICIES: [Policy; 4] = [
    Policy {
        id: python_manager::POLICY_ID,
        name: "Python package manager",
        description: "Blocks direct python/python3 runs in projects owned by Poetry, uv, Rye, \
                      PDM, Hatch, Pixi or Conda and suggests the manager's run wrapper",
        keywords: &[],
        default_enabled: true,
        check: python_manager::check,
    },
    Policy {
        id: modern_cli::POLICY_ID,
        name: "Modern CLI tools",
        description: "Blocks legacy grep/find/cat/ls when rg/fd/bat/eza are installed",
        keywords: &[],
        default_enabled: false,
        check: modern_cli::check,
    },
    Policy {
        id: native_timeout::POLICY_ID,
        name: "Native Bash timeout",
        description: "Blocks timeout/gtimeout wrappers in favor of the Bash tool's timeout parameter",
        keywords: &["timeout"],
        default_enabled: false,
        check: native_timeout::check,
    },
    Policy {
        id: github_write::POLICY_ID,
        name: "GitHub write guard",
        description: "Blocks gh commands and gh api calls that modify GitHub state",
        keywords: &["gh"],
        default_enabled: false,
        check: github_write::check,
    },
];

/// Global registry of built-in policies.
pub static REGISTRY: PolicyRegistry = PolicyRegistry {
    policies: &POLICIES,
};

impl PolicyRegistry {
    #[must_use]
    pub const fn all(&self) -> &'static [Policy] {
        self.policies
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'static Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn default_ids(&self) -> HashSet<String> {
        self.policies
            .iter()
            .filter(|p| p.default_enabled)
            .map(|p| p.id.to_string())
            .collect()
    }

    /// Enabled policies in registry order. Unknown ids are ignored.
    #[must_use]
    pub fn enabled(&self, ids: &HashSet<String>) -> Vec<&'static Policy> {
        self.policies
            .iter()
            .filter(|p| ids.contains(p.id))
            .collect()
    }
}
