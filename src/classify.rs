//! Command classifier for the Python runtime policy.
//!
//! Looks only at the leading invocation of a command line and sorts it into
//! one of four buckets. No filesystem access happens here; the evaluator
//! consults the project directory only for [`Classification::DirectRuntimeInvocation`].
//!
//! Matching is by exact token, never by substring: `mypython_script.sh` and
//! `python3-config` are not the `python` runtime.

use crate::project::ManagerKind;
use crate::shell::rest_after_first_token;
use memchr::memmem;
use smallvec::SmallVec;

/// Runtime executables recognized by default.
pub const DEFAULT_RUNTIMES: &[&str] = &["python", "python3"];

/// Modules that operate a package manager when run with `<runtime> -m`.
pub const DEFAULT_BOOTSTRAP_MODULES: &[&str] = &[
    "poetry", "uv", "pdm", "hatch", "rye", "pixi", "pip", "conda", "mamba",
];

/// How the leading invocation of a command relates to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// `<runtime> -m <manager-module> ...`
    Bootstrap { runtime: &'a str, module: &'a str },
    /// `<runtime> ...` run directly.
    DirectRuntimeInvocation {
        runtime: &'a str,
        /// Everything after the runtime token, verbatim.
        args: &'a str,
    },
    /// `<manager> run ...`
    AlreadyWrapped {
        manager: ManagerKind,
        runtime: Option<&'a str>,
    },
    /// Anything else.
    Unrelated,
}

impl Classification<'_> {
    /// Short label for logs and `ptg test` output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bootstrap { .. } => "bootstrap",
            Self::DirectRuntimeInvocation { .. } => "direct-runtime",
            Self::AlreadyWrapped { .. } => "already-wrapped",
            Self::Unrelated => "unrelated",
        }
    }

    /// Whether the decision depends on the project directory.
    #[must_use]
    pub const fn needs_project_context(&self) -> bool {
        matches!(self, Self::DirectRuntimeInvocation { .. })
    }
}

/// Classifier settings: which runtimes and bootstrap modules to recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    runtimes: Vec<String>,
    bootstrap_modules: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_RUNTIMES.iter().copied(),
            DEFAULT_BOOTSTRAP_MODULES.iter().copied(),
        )
    }
}

impl Classifier {
    #[must_use]
    pub fn new<R, M>(runtimes: R, bootstrap_modules: M) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            runtimes: runtimes.into_iter().map(Into::into).collect(),
            bootstrap_modules: bootstrap_modules.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn runtimes(&self) -> &[String] {
        &self.runtimes
    }

    fn is_runtime(&self, token: &str) -> bool {
        self.runtimes.iter().any(|r| r == token)
    }

    fn is_bootstrap_module(&self, token: &str) -> bool {
        self.bootstrap_modules.iter().any(|m| m == token)
    }

    /// Cheap pre-check: can `command` mention any runtime at all?
    #[inline]
    #[must_use]
    pub fn might_invoke_runtime(&self, command: &str) -> bool {
        self.runtimes
            .iter()
            .any(|r| memmem::find(command.as_bytes(), r.as_bytes()).is_some())
    }

    /// Classify the leading invocation of `command`.
    #[must_use]
    pub fn classify<'a>(&self, command: &'a str) -> Classification<'a> {
        let trimmed = command.trim();
        let tokens: SmallVec<[&str; 4]> = trimmed.split_whitespace().take(4).collect();
        let Some(&first) = tokens.first() else {
            return Classification::Unrelated;
        };

        if let Some(manager) = ManagerKind::from_executable(first) {
            if tokens.get(1) == Some(&"run") {
                let runtime = trimmed
                    .split_whitespace()
                    .skip(2)
                    .find(|token| self.is_runtime(token));
                return Classification::AlreadyWrapped { manager, runtime };
            }
            return Classification::Unrelated;
        }

        if !self.might_invoke_runtime(first) || !self.is_runtime(first) {
            return Classification::Unrelated;
        }

        if let Some(module) = bootstrap_module(&tokens) {
            if self.is_bootstrap_module(module) {
                return Classification::Bootstrap {
                    runtime: first,
                    module,
                };
            }
        }

        Classification::DirectRuntimeInvocation {
            runtime: first,
            args: rest_after_first_token(trimmed),
        }
    }
}

/// Module named by `-m <module>` or `-m<module>` right after the runtime.
fn bootstrap_module<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    let flag = *tokens.get(1)?;
    if flag == "-m" {
        return tokens.get(2).copied();
    }
    flag.strip_prefix("-m").filter(|m| !m.is_empty())
}

/// Classify with the default runtimes and modules.
#[must_use]
pub fn classify_command(command: &str) -> Classification<'_> {
    Classifier::default().classify(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn direct_invocation_keeps_arguments() {
        assert_eq!(
            classify_command("python script.py --flag"),
            Classification::DirectRuntimeInvocation {
                runtime: "python",
                args: "script.py --flag",
            }
        );
        assert_eq!(
            classify_command("  python3 -c 'import sys'  "),
            Classification::DirectRuntimeInvocation {
                runtime: "python3",
                args: "-c 'import sys'",
            }
        );
    }

    #[test]
    fn bare_runtime_is_direct() {
        assert_eq!(
            classify_command("python3"),
            Classification::DirectRuntimeInvocation {
                runtime: "python3",
                args: "",
            }
        );
    }

    #[test]
    fn bootstrap_modules_are_recognized() {
        assert_eq!(
            classify_command("python -m pip install poetry"),
            Classification::Bootstrap {
                runtime: "python",
                module: "pip",
            }
        );
        assert_eq!(
            classify_command("python3 -muv sync"),
            Classification::Bootstrap {
                runtime: "python3",
                module: "uv",
            }
        );
    }

    #[test]
    fn non_manager_module_is_direct() {
        assert!(matches!(
            classify_command("python -m pytest -q"),
            Classification::DirectRuntimeInvocation { .. }
        ));
        assert!(matches!(
            classify_command("python -m pipx install black"),
            Classification::DirectRuntimeInvocation { .. }
        ));
        assert!(matches!(
            classify_command("python -m"),
            Classification::DirectRuntimeInvocation { .. }
        ));
    }

    #[test]
    fn manager_run_is_already_wrapped() {
        assert_eq!(
            classify_command("poetry run python app.py"),
            Classification::AlreadyWrapped {
                manager: ManagerKind::Poetry,
                runtime: Some("python"),
            }
        );
        assert_eq!(
            classify_command("conda run -n ml python3 train.py"),
            Classification::AlreadyWrapped {
                manager: ManagerKind::CondaOrMamba,
                runtime: Some("python3"),
            }
        );
        assert_eq!(
            classify_command("uv run pytest"),
            Classification::AlreadyWrapped {
                manager: ManagerKind::Uv,
                runtime: None,
            }
        );
    }

    #[test]
    fn manager_without_run_is_unrelated() {
        assert_eq!(classify_command("poetry install"), Classification::Unrelated);
        assert_eq!(classify_command("uv sync"), Classification::Unrelated);
    }

    #[test]
    fn substring_matches_are_unrelated() {
        for cmd in [
            "mypython_script.sh",
            "./python script.py",
            "python3-config --includes",
            "pythonista run",
            "echo python",
            "cat python.txt",
            "ipython",
        ] {
            assert_eq!(classify_command(cmd), Classification::Unrelated, "{cmd}");
        }
    }

    #[test]
    fn empty_command_is_unrelated() {
        assert_eq!(classify_command(""), Classification::Unrelated);
        assert_eq!(classify_command("   \n\t"), Classification::Unrelated);
    }

    #[test]
    fn custom_runtimes() {
        let classifier = Classifier::new(["python3.12"], ["pip"]);
        assert!(matches!(
            classifier.classify("python3.12 app.py"),
            Classification::DirectRuntimeInvocation { .. }
        ));
        assert_eq!(classifier.classify("python app.py"), Classification::Unrelated);
    }

    #[test]
    fn only_direct_invocations_need_project_context() {
        assert!(classify_command("python x.py").needs_project_context());
        assert!(!classify_command("python -m pip list").needs_project_context());
        assert!(!classify_command("poetry run python").needs_project_context());
        assert!(!classify_command("git status").needs_project_context());
    }

    proptest! {
        /// A leading token that merely contains the runtime name is never
        /// a direct invocation.
        #[test]
        fn runtime_substrings_never_direct(prefix in "[a-z_./]{1,8}", suffix in "[a-z_.]{0,8}", args in "[ a-z.]{0,20}") {
            let cmd = format!("{prefix}python{suffix} {args}");
            let is_direct = matches!(
                classify_command(&cmd),
                Classification::DirectRuntimeInvocation { .. }
            );
            prop_assert!(!is_direct);
        }
    }
}
