//! Configuration system for ptg.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. Explicit file named by `PTG_CONFIG`
//! 3. Project config (`.ptg.toml` in the project root)
//! 4. User config (`~/.config/ptg/config.toml`)
//! 5. System config (`/etc/ptg/config.toml`)
//! 6. Compiled defaults (lowest priority)
//!
//! Missing or invalid files are skipped: a broken config must never turn
//! into a blocked command.

use crate::classify::{Classifier, DEFAULT_BOOTSTRAP_MODULES, DEFAULT_RUNTIMES};
use crate::logging::LoggingConfig;
use crate::policies::{EvalContext, REGISTRY, ToolReplacement};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "PTG";

const CONFIG_DIR_NAME: &str = "ptg";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
pub const PROJECT_CONFIG_NAME: &str = ".ptg.toml";

/// Default cap on the hook's stdin payload.
pub const DEFAULT_MAX_HOOK_INPUT_BYTES: usize = 256 * 1024;

/// Default cap on the command string itself.
pub const DEFAULT_MAX_COMMAND_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub policies: PoliciesConfig,
    pub python_manager: PythonManagerConfig,
    pub modern_cli: ModernCliConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Append blocked commands to this file (optional).
    pub log_file: Option<String>,
    /// Print diagnostics on stderr in hook mode.
    pub verbose: bool,
    pub max_hook_input_bytes: Option<usize>,
    pub max_command_bytes: Option<usize>,
}

impl GeneralConfig {
    #[must_use]
    pub fn max_hook_input_bytes(&self) -> usize {
        self.max_hook_input_bytes
            .unwrap_or(DEFAULT_MAX_HOOK_INPUT_BYTES)
    }

    #[must_use]
    pub fn max_command_bytes(&self) -> usize {
        self.max_command_bytes.unwrap_or(DEFAULT_MAX_COMMAND_BYTES)
    }
}

/// Policy enablement. Default-on policies stay on unless disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoliciesConfig {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonManagerConfig {
    /// Runtime executables to guard.
    pub runtimes: Option<Vec<String>>,
    /// Modules allowed after `-m`.
    pub bootstrap_modules: Option<Vec<String>>,
}

impl PythonManagerConfig {
    #[must_use]
    pub fn classifier(&self) -> Classifier {
        let runtimes = self.runtimes.clone().unwrap_or_else(|| {
            DEFAULT_RUNTIMES.iter().map(|s| (*s).to_string()).collect()
        });
        let modules = self.bootstrap_modules.clone().unwrap_or_else(|| {
            DEFAULT_BOOTSTRAP_MODULES
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        });
        Classifier::new(runtimes, modules)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModernCliConfig {
    pub replacements: Option<Vec<ToolReplacement>>,
}

impl ModernCliConfig {
    #[must_use]
    pub fn replacements(&self) -> Vec<ToolReplacement> {
        self.replacements
            .clone()
            .unwrap_or_else(ToolReplacement::defaults)
    }
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    #[must_use]
    pub fn load(project_root: Option<&Path>) -> Self {
        Self::load_with_env(project_root, |key| env::var(key).ok())
    }

    /// [`Config::load`] with an explicit environment lookup.
    #[must_use]
    pub fn load_with_env(project_root: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(system) = Self::load_from_file(&Path::new("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)) {
            config.merge(system);
        }
        if let Some(user) = Self::user_config_path().and_then(|p| Self::load_from_file(&p)) {
            config.merge(user);
        }
        if let Some(project) = project_root.and_then(|root| Self::load_from_file(&root.join(PROJECT_CONFIG_NAME))) {
            config.merge(project);
        }
        if let Some(explicit) = env(&format!("{ENV_PREFIX}_CONFIG"))
            .filter(|p| !p.trim().is_empty())
            .and_then(|p| Self::load_from_file(Path::new(p.trim())))
        {
            config.merge(explicit);
        }

        config.apply_env_overrides(env);
        config
    }

    /// Load one file, ignoring any error.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        match Self::try_load_from_file(path) {
            Ok(config) => Some(config),
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring config file");
                None
            }
        }
    }

    /// Load one file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn try_load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge another config into this one (other takes priority).
    fn merge(&mut self, other: Self) {
        if other.general.log_file.is_some() {
            self.general.log_file = other.general.log_file;
        }
        if other.general.verbose {
            self.general.verbose = true;
        }
        if other.general.max_hook_input_bytes.is_some() {
            self.general.max_hook_input_bytes = other.general.max_hook_input_bytes;
        }
        if other.general.max_command_bytes.is_some() {
            self.general.max_command_bytes = other.general.max_command_bytes;
        }

        self.policies.enabled.extend(other.policies.enabled);
        self.policies.disabled.extend(other.policies.disabled);

        if other.python_manager.runtimes.is_some() {
            self.python_manager.runtimes = other.python_manager.runtimes;
        }
        if other.python_manager.bootstrap_modules.is_some() {
            self.python_manager.bootstrap_modules = other.python_manager.bootstrap_modules;
        }
        if other.modern_cli.replacements.is_some() {
            self.modern_cli.replacements = other.modern_cli.replacements;
        }
        if other.logging != LoggingConfig::default() {
            self.logging = other.logging;
        }
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| env(&format!("{ENV_PREFIX}_{name}"));

        // PTG_POLICIES="modern_cli,native_timeout"
        if let Some(policies) = var("POLICIES") {
            self.policies.enabled = split_list(&policies);
        }
        // PTG_DISABLE="python_manager"
        if let Some(disable) = var("DISABLE") {
            self.policies.disabled = split_list(&disable);
        }
        // PTG_VERBOSE=1
        if env_flag(var("VERBOSE").as_deref()) {
            self.general.verbose = true;
        }
        if let Some(log_file) = var("LOG_FILE").filter(|s| !s.is_empty()) {
            self.general.log_file = Some(log_file);
        }
    }

    /// Check if the bypass flag is set (escape hatch).
    #[must_use]
    pub fn is_bypassed() -> bool {
        env_flag(env::var(format!("{ENV_PREFIX}_BYPASS")).ok().as_deref())
    }

    /// Ids of the policies that will run.
    #[must_use]
    pub fn enabled_policy_ids(&self) -> HashSet<String> {
        let mut ids = REGISTRY.default_ids();
        ids.extend(self.policies.enabled.iter().cloned());
        for disabled in &self.policies.disabled {
            ids.remove(disabled);
        }
        ids
    }

    /// Evaluation context for one project root.
    #[must_use]
    pub fn eval_context(&self, root: impl Into<PathBuf>) -> EvalContext {
        EvalContext::new(root)
            .with_policies(REGISTRY.enabled(&self.enabled_policy_ids()))
            .with_classifier(self.python_manager.classifier())
            .with_replacements(self.modern_cli.replacements())
    }

    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if TOML serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the sample config to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyExists`] when the file exists and
    /// `force` is false, or [`ConfigError::Write`].
    pub fn write_sample(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, Self::generate_sample_config()).map_err(write_err)
    }

    /// Sample configuration with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        r#"# ptg configuration
#
# Looked up in /etc/ptg/config.toml, ~/.config/ptg/config.toml and
# .ptg.toml in the project root. Later files win.

[general]
# Append blocked commands to a file (optional)
# log_file = "~/.local/share/ptg/blocked.log"

# Print diagnostics on stderr
verbose = false

# Inputs larger than this are allowed unchecked
# max_hook_input_bytes = 262144
# max_command_bytes = 65536

[policies]
# python_manager is on by default. Others are opt-in:
#   modern_cli      - grep/find/cat/ls -> rg/fd/bat/eza when installed
#   native_timeout  - timeout/gtimeout -> Bash tool timeout parameter
#   github_write    - block gh commands that modify GitHub
enabled = [
    # "modern_cli",
    # "native_timeout",
    # "github_write",
]
disabled = []

[python_manager]
# runtimes = ["python", "python3"]
# bootstrap_modules = ["poetry", "uv", "pdm", "hatch", "rye", "pixi", "pip", "conda", "mamba"]

[modern_cli]
# replacements = [
#     { legacy = "grep", modern = "rg" },
#     { legacy = "find", modern = "fd" },
#     { legacy = "cat", modern = "bat" },
#     { legacy = "ls", modern = "eza" },
# ]

[logging]
# Structured decision log
enabled = false
# file = "~/.local/share/ptg/decisions.log"
format = "text"   # "text" | "json"

[logging.redaction]
enabled = false
mode = "arguments"   # "none" | "arguments" | "full"
max_argument_len = 50

[logging.events]
block = true
allow = false
"#
        .to_string()
    }
}

/// Whether a boolean environment variable is switched on. Unset, empty,
/// `0`, `false`, `no` and `off` (any case) are off.
fn env_flag(value: Option<&str>) -> bool {
    value.map(str::trim).is_some_and(|v| {
        !(v.is_empty()
            || v == "0"
            || v.eq_ignore_ascii_case("false")
            || v.eq_ignore_ascii_case("no")
            || v.eq_ignore_ascii_case("off"))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
