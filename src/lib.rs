#![forbid(unsafe_code)]
//! Project Tool Guard (ptg) library.
//!
//! Decides whether a shell command an AI coding agent is about to run
//! respects the project's own tooling. The main policy blocks direct
//! `python` invocations in projects owned by a package manager (Poetry, uv,
//! Rye, PDM, Hatch, Pixi, Conda) and suggests the wrapped command instead.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Configuration                             │
//! │   (env vars → PTG_CONFIG → project → user → system → defaults)   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Evaluator                                │
//! │        (shared by hook mode and `ptg test`, first block wins)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Policy Registry                             │
//! │  ┌────────────────┐ ┌────────────┐ ┌──────────────┐ ┌─────────┐ │
//! │  │ python_manager │ │ modern_cli │ │native_timeout│ │gh write │ │
//! │  └────────────────┘ └────────────┘ └──────────────┘ └─────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                │                                   │
//!                ▼                                   ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  Classifier (command shape)  │   │ Project scan → owner resolve │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use project_tool_guard::config::Config;
//! use project_tool_guard::evaluator::{CommandRequest, evaluate_request};
//!
//! let root = std::path::Path::new("/srv/app");
//! let config = Config::load(Some(root));
//! let request = CommandRequest::new("Bash", "python manage.py migrate");
//! let decision = evaluate_request(&request, &config.eval_context(root));
//!
//! if decision.is_blocked() {
//!     eprintln!("{}", decision.message.unwrap_or_default());
//! }
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod evaluator;
pub mod hook;
pub mod logging;
pub mod perf;
pub mod policies;
pub mod project;
pub mod shell;

pub use classify::{Classification, Classifier, classify_command};
pub use config::{Config, ConfigError};
pub use evaluator::{
    CommandRequest, Decision, EvaluationResult, evaluate_request, evaluate_with_deadline,
};
pub use hook::{EXIT_ALLOW, EXIT_BLOCK, HookInput, HookReadError};
pub use perf::{Budget, BudgetStatus, Deadline, HOOK_EVALUATION_BUDGET};
pub use policies::{EvalContext, Policy, PolicyMatch, PolicyRegistry, REGISTRY};
pub use project::{ManagerKind, ProjectContext, Signal, SignalSource};
