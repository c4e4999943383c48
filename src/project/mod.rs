//! Project tooling detection.
//!
//! A project directory is "owned" by at most one package/environment manager.
//! Ownership is decided from evidence on disk ([`Signal`]s) gathered by the
//! [`scanner`] and reduced to a single [`ManagerKind`] by the [`resolver`].
//!
//! ```text
//!   root dir ──► scan_project ──► [Signal, Signal, ...] ──► resolve_owner ──► ManagerKind
//! ```
//!
//! Nothing here is cached: a [`ProjectContext`] is built for one request and
//! dropped once the decision has been made.

pub mod resolver;
pub mod scanner;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use resolver::{PRECEDENCE, resolve_owner};
pub use scanner::scan_project;

/// Package/environment manager that can own a Python project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Poetry,
    Uv,
    Rye,
    Pdm,
    Hatch,
    Pixi,
    #[serde(rename = "conda")]
    CondaOrMamba,
    /// No manager markers were found.
    None,
}

impl ManagerKind {
    /// Every real manager, strongest first.
    pub const ALL: [Self; 7] = [
        Self::Poetry,
        Self::Uv,
        Self::Rye,
        Self::Pdm,
        Self::Hatch,
        Self::Pixi,
        Self::CondaOrMamba,
    ];

    /// Short lowercase name, as used in messages and JSON output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Poetry => "poetry",
            Self::Uv => "uv",
            Self::Rye => "rye",
            Self::Pdm => "pdm",
            Self::Hatch => "hatch",
            Self::Pixi => "pixi",
            Self::CondaOrMamba => "conda",
            Self::None => "none",
        }
    }

    /// Command prefix that runs a program inside the manager's environment.
    ///
    /// Conda needs an environment name; the placeholder is replaced by
    /// [`ProjectContext::run_wrapper`] when the environment file names one.
    #[must_use]
    pub const fn run_wrapper(self) -> Option<&'static str> {
        match self {
            Self::Poetry => Some("poetry run"),
            Self::Uv => Some("uv run"),
            Self::Rye => Some("rye run"),
            Self::Pdm => Some("pdm run"),
            Self::Hatch => Some("hatch run"),
            Self::Pixi => Some("pixi run"),
            Self::CondaOrMamba => Some("conda run -n <env_name>"),
            Self::None => None,
        }
    }

    /// Executable names that identify this manager as a command word.
    #[must_use]
    pub const fn executables(self) -> &'static [&'static str] {
        match self {
            Self::Poetry => &["poetry"],
            Self::Uv => &["uv"],
            Self::Rye => &["rye"],
            Self::Pdm => &["pdm"],
            Self::Hatch => &["hatch"],
            Self::Pixi => &["pixi"],
            Self::CondaOrMamba => &["conda", "mamba", "micromamba"],
            Self::None => &[],
        }
    }

    /// Look up the manager whose executable is `word`.
    #[must_use]
    pub fn from_executable(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.executables().contains(&word))
    }

    /// Rank in the resolver's precedence table.
    #[must_use]
    pub fn precedence(self) -> Precedence {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .and_then(|idx| u8::try_from(idx).ok())
            .map_or(Precedence::WEAKEST, Precedence)
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Strength of a signal. Lower rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Precedence(pub u8);

impl Precedence {
    pub const STRONGEST: Self = Self(0);
    pub const WEAKEST: Self = Self(u8::MAX);
}

/// How a `.python-version` file was tied to Rye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RyeMarker {
    /// File contents mention `rye`.
    Contents,
    /// A `.rye/` directory sits next to the file.
    Directory,
}

/// What was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalSource {
    /// A lock file such as `poetry.lock`.
    LockFile(&'static str),
    /// A `[tool.<name>]` table inside `pyproject.toml`.
    ManifestSection(&'static str),
    /// `.python-version`, optionally with Rye indicators.
    PythonVersion(Option<RyeMarker>),
    /// A manager-specific config file such as `pixi.toml`.
    ConfigFile(&'static str),
    /// A conda environment file, with its `name:` if declared.
    CondaEnvironment {
        file: &'static str,
        env_name: Option<String>,
    },
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockFile(name) => write!(f, "lock file `{name}`"),
            Self::ManifestSection(tool) => {
                write!(f, "`[tool.{tool}]` section in `{}`", scanner::MANIFEST_FILE)
            }
            Self::PythonVersion(None) => write!(f, "`{}` file", scanner::PYTHON_VERSION_FILE),
            Self::PythonVersion(Some(RyeMarker::Contents)) => write!(
                f,
                "`{}` file mentioning rye",
                scanner::PYTHON_VERSION_FILE
            ),
            Self::PythonVersion(Some(RyeMarker::Directory)) => write!(
                f,
                "`{}` file with a `{}/` directory",
                scanner::PYTHON_VERSION_FILE,
                scanner::RYE_DIR
            ),
            Self::ConfigFile(name) => write!(f, "config file `{name}`"),
            Self::CondaEnvironment {
                file,
                env_name: Some(env),
            } => write!(f, "conda environment file `{file}` (name: {env})"),
            Self::CondaEnvironment {
                file,
                env_name: None,
            } => write!(f, "conda environment file `{file}`"),
        }
    }
}

/// A single piece of ownership evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub kind: ManagerKind,
    pub source: SignalSource,
    pub strength: Precedence,
}

impl Signal {
    #[must_use]
    pub fn new(kind: ManagerKind, source: SignalSource) -> Self {
        Self {
            kind,
            source,
            strength: kind.precedence(),
        }
    }
}

/// Resolved tooling state of one project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub signals: Vec<Signal>,
    pub owner: ManagerKind,
}

impl ProjectContext {
    /// Scan `root` and resolve its owning manager.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        let signals = scan_project(root);
        let owner = resolve_owner(&signals);
        tracing::debug!(
            root = %root.display(),
            signals = signals.len(),
            owner = owner.label(),
            "resolved project owner"
        );
        Self {
            root: root.to_path_buf(),
            signals,
            owner,
        }
    }

    /// Run-wrapper for the owner, with the conda environment name filled in
    /// when the environment file declares one.
    #[must_use]
    pub fn run_wrapper(&self) -> Option<String> {
        let wrapper = self.owner.run_wrapper()?;
        if self.owner != ManagerKind::CondaOrMamba {
            return Some(wrapper.to_string());
        }
        let env_name = self.signals.iter().find_map(|signal| match &signal.source {
            SignalSource::CondaEnvironment {
                env_name: Some(name),
                ..
            } => Some(name.as_str()),
            _ => None,
        });
        Some(env_name.map_or_else(
            || wrapper.to_string(),
            |name| format!("conda run -n {name}"),
        ))
    }

    /// Signals that back the resolved owner.
    pub fn owner_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals
            .iter()
            .filter(move |signal| signal.kind == self.owner)
    }
}
