//! Signal scanner.
//!
//! Looks at a single directory (never its children) and reports every
//! ownership marker it finds, in a fixed detection order. Deciding between
//! competing markers is the resolver's job; the scanner only collects.
//!
//! Every filesystem fault is treated as "marker absent": a missing root, a
//! permission error or a file that vanishes mid-scan all produce fewer
//! signals, never an error.

use super::{ManagerKind, RyeMarker, Signal, SignalSource};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Generic Python manifest that may carry `[tool.*]` tables.
pub const MANIFEST_FILE: &str = "pyproject.toml";

/// Interpreter pin file shared by uv and Rye.
pub const PYTHON_VERSION_FILE: &str = ".python-version";

/// Rye's per-project state directory.
pub const RYE_DIR: &str = ".rye";

/// Upper bound on bytes read from any marker file.
const MAX_MARKER_BYTES: u64 = 1024 * 1024;

/// `[tool.<name>]` tables recognized in the manifest, in detection order.
const MANIFEST_SECTIONS: &[(&str, ManagerKind)] = &[
    ("poetry", ManagerKind::Poetry),
    ("pdm", ManagerKind::Pdm),
    ("hatch", ManagerKind::Hatch),
];

/// One entry of the detection table.
#[derive(Debug, Clone, Copy)]
enum Marker {
    /// A lock file whose mere presence is the signal.
    Lock(&'static str, ManagerKind),
    /// `[tool.*]` tables in the manifest.
    Manifest,
    /// `.python-version`, resolved to Rye or uv.
    PythonVersion,
    /// A manager config file whose presence is the signal.
    Config(&'static str, ManagerKind),
    /// A conda environment file.
    CondaEnvironment(&'static str),
}

/// Detection order. Each marker is probed independently.
const MARKERS: &[Marker] = &[
    Marker::Lock("poetry.lock", ManagerKind::Poetry),
    Marker::Lock("uv.lock", ManagerKind::Uv),
    Marker::Manifest,
    Marker::PythonVersion,
    Marker::Lock("rye.lock", ManagerKind::Rye),
    Marker::Lock("pdm.lock", ManagerKind::Pdm),
    Marker::Config("hatch.toml", ManagerKind::Hatch),
    Marker::Config("pixi.toml", ManagerKind::Pixi),
    Marker::Lock("pixi.lock", ManagerKind::Pixi),
    Marker::CondaEnvironment("environment.yml"),
    Marker::CondaEnvironment("environment.yaml"),
    Marker::CondaEnvironment("conda.yml"),
];

/// Scan `root` (non-recursively) for manager markers.
///
/// Returns an empty list when `root` is not a readable directory.
#[must_use]
pub fn scan_project(root: &Path) -> Vec<Signal> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "project root is not a directory");
        return Vec::new();
    }

    let mut signals = Vec::new();
    for marker in MARKERS {
        match *marker {
            Marker::Lock(name, kind) | Marker::Config(name, kind) => {
                if root.join(name).is_file() {
                    let source = if matches!(marker, Marker::Lock(..)) {
                        SignalSource::LockFile(name)
                    } else {
                        SignalSource::ConfigFile(name)
                    };
                    signals.push(Signal::new(kind, source));
                }
            }
            Marker::Manifest => scan_manifest(root, &mut signals),
            Marker::PythonVersion => {
                if let Some(signal) = scan_python_version(root) {
                    signals.push(signal);
                }
            }
            Marker::CondaEnvironment(name) => {
                let path = root.join(name);
                if path.is_file() {
                    let env_name = read_capped(&path).and_then(|text| conda_env_name(&text));
                    signals.push(Signal::new(
                        ManagerKind::CondaOrMamba,
                        SignalSource::CondaEnvironment {
                            file: name,
                            env_name,
                        },
                    ));
                }
            }
        }
    }

    tracing::trace!(root = %root.display(), ?signals, "scan complete");
    signals
}

/// Record one signal per recognized `[tool.*]` table.
fn scan_manifest(root: &Path, signals: &mut Vec<Signal>) {
    let Some(content) = read_capped(&root.join(MANIFEST_FILE)) else {
        return;
    };
    for (tool, kind) in manifest_tool_sections(&content) {
        signals.push(Signal::new(kind, SignalSource::ManifestSection(tool)));
    }
}

/// Which recognized `[tool.*]` tables a manifest declares.
///
/// Valid TOML is inspected structurally, so `[tool.poetry.dependencies]`
/// counts as a Poetry table. A manifest that fails to parse falls back to a
/// line scan for table headers.
#[must_use]
pub fn manifest_tool_sections(content: &str) -> Vec<(&'static str, ManagerKind)> {
    match content.parse::<toml::Table>() {
        Ok(table) => {
            let Some(tool) = table.get("tool").and_then(toml::Value::as_table) else {
                return Vec::new();
            };
            MANIFEST_SECTIONS
                .iter()
                .filter(|(name, _)| tool.contains_key(*name))
                .copied()
                .collect()
        }
        Err(err) => {
            tracing::debug!(error = %err, "manifest is not valid TOML; scanning headers");
            MANIFEST_SECTIONS
                .iter()
                .filter(|(name, _)| has_table_header(content, name))
                .copied()
                .collect()
        }
    }
}

fn has_table_header(content: &str, tool: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim_start();
        let Some(header) = line
            .strip_prefix("[[")
            .or_else(|| line.strip_prefix('['))
        else {
            return false;
        };
        let Some(rest) = header.trim_start().strip_prefix("tool.") else {
            return false;
        };
        rest.strip_prefix(tool).is_some_and(|tail| {
            let tail = tail.trim_start();
            tail.starts_with(']') || tail.starts_with('.')
        })
    })
}

fn scan_python_version(root: &Path) -> Option<Signal> {
    let content = read_capped(&root.join(PYTHON_VERSION_FILE))?;
    let marker = if content.to_ascii_lowercase().contains("rye") {
        Some(RyeMarker::Contents)
    } else if root.join(RYE_DIR).is_dir() {
        Some(RyeMarker::Directory)
    } else {
        None
    };
    let kind = if marker.is_some() {
        ManagerKind::Rye
    } else {
        ManagerKind::Uv
    };
    Some(Signal::new(kind, SignalSource::PythonVersion(marker)))
}

/// The part of a conda environment file the scanner cares about.
#[derive(Debug, Deserialize)]
struct CondaEnvironmentFile {
    name: Option<String>,
}

/// Top-level `name:` of a conda environment file. Invalid YAML, or a name
/// that is missing, empty or not a string, yields `None`.
fn conda_env_name(content: &str) -> Option<String> {
    match serde_yaml::from_str::<CondaEnvironmentFile>(content) {
        Ok(env) => env.name.filter(|name| !name.trim().is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable conda environment file");
            None
        }
    }
}

/// Read at most [`MAX_MARKER_BYTES`] of a file, `None` on any failure.
fn read_capped(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut bytes = Vec::new();
    file.take(MAX_MARKER_BYTES).read_to_end(&mut bytes).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
