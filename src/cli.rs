//! CLI argument parsing and command handling.
//!
//! Without a subcommand `ptg` runs as a hook (see `main.rs`). The
//! subcommands exist for humans: trying commands, inspecting what a
//! directory resolves to, and managing configuration.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::evaluator::{CommandRequest, evaluate_with_deadline};
use crate::policies::REGISTRY;
use crate::project::{ManagerKind, ProjectContext};

/// Steers AI coding agents towards a project's own tooling.
///
/// ptg (`project_tool_guard`) blocks commands that bypass the project's
/// package manager, such as running `python` directly in a Poetry project,
/// and suggests the wrapped command instead.
#[derive(Parser, Debug)]
#[command(name = "ptg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a command as the hook would and print the decision
    #[command(name = "test")]
    TestCommand {
        /// The command to evaluate
        command: String,

        /// Project directory to evaluate in (default: current directory)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Extra policies to enable for this run (comma-separated)
        #[arg(long, value_delimiter = ',')]
        policies: Option<Vec<String>>,

        /// Tool name to report (default: Bash)
        #[arg(long, default_value = "Bash")]
        tool: String,
    },

    /// Show the manager markers found in a directory and the resolved owner
    #[command(name = "detect")]
    Detect {
        /// Directory to scan (default: current directory)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// List policies and whether they are enabled
    #[command(name = "policies")]
    ListPolicies {
        /// Show descriptions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print or write a sample configuration file
    #[command(name = "init")]
    Init {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    ShowConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Run a subcommand.
///
/// # Errors
///
/// Returns an error when a subcommand fails, or when called without one.
pub fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Command::TestCommand {
            command,
            dir,
            policies,
            tool,
        }) => {
            let root = resolve_dir(dir)?;
            let config = Config::load(Some(&root));
            test_command(&config, &root, &command, policies.unwrap_or_default(), &tool);
        }
        Some(Command::Detect { dir, format }) => {
            let root = resolve_dir(dir)?;
            detect(&root, format)?;
        }
        Some(Command::ListPolicies { verbose }) => {
            let config = Config::load(current_dir().as_deref());
            list_policies(&config, verbose);
        }
        Some(Command::Init { output, force }) => {
            init_config(output.as_deref(), force)?;
        }
        Some(Command::ShowConfig) => {
            let root = current_dir();
            let config = Config::load(root.as_deref());
            show_config(&config, root.as_deref())?;
        }
        None => {
            return Err("No subcommand provided. Running in hook mode.".into());
        }
    }
    Ok(())
}

fn current_dir() -> Option<PathBuf> {
    std::env::current_dir().ok()
}

fn resolve_dir(dir: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match dir {
        Some(dir) if dir.is_dir() => Ok(dir),
        Some(dir) => Err(format!("Not a directory: {}", dir.display()).into()),
        None => Ok(std::env::current_dir()?),
    }
}

/// Evaluate through the shared evaluator, exactly as hook mode does.
fn test_command(config: &Config, root: &Path, command: &str, extra: Vec<String>, tool: &str) {
    let mut effective = config.clone();
    effective.policies.enabled.extend(extra);

    let request = CommandRequest::new(tool, command).with_cwd_override(Some(root.to_path_buf()));
    let ctx = effective.eval_context(root);
    let result = evaluate_with_deadline(&request, ctx, None);
    let decision = &result.decision;

    println!("Command: {command}");
    println!("Directory: {}", root.display());
    println!();

    if decision.allow {
        println!("Result: {}", "ALLOWED".green().bold());
    } else {
        println!("Result: {}", "BLOCKED".red().bold());
        if let Some(policy) = decision.policy {
            println!("Policy: {policy}");
        }
        if let Some(owner) = decision.reason_owner {
            println!("Owner: {owner}");
        }
        if let Some(reason) = &decision.reason {
            println!("Reason: {reason}");
        }
        if let Some(suggestion) = &decision.suggestion {
            println!("Suggestion: {suggestion}");
        }
        if let Some(message) = &decision.message {
            println!();
            println!("Message:");
            for line in message.lines() {
                println!("  {line}");
            }
        }
    }
    if let Some(project) = &result.project {
        println!("Project owner: {}", project.owner);
    }
}

#[derive(Serialize)]
struct DetectReport {
    root: String,
    owner: ManagerKind,
    run_wrapper: Option<String>,
    signals: Vec<SignalReport>,
}

#[derive(Serialize)]
struct SignalReport {
    manager: ManagerKind,
    source: String,
    rank: u8,
}

fn detect(root: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let project = ProjectContext::detect(root);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&detect_report(&project))?);
        }
        OutputFormat::Pretty => print_detect_pretty(&project),
    }
    Ok(())
}

fn detect_report(project: &ProjectContext) -> DetectReport {
    DetectReport {
        root: project.root.display().to_string(),
        owner: project.owner,
        run_wrapper: project.run_wrapper(),
        signals: project
            .signals
            .iter()
            .map(|signal| SignalReport {
                manager: signal.kind,
                source: signal.source.to_string(),
                rank: signal.strength.0,
            })
            .collect(),
    }
}

fn print_detect_pretty(project: &ProjectContext) {
    println!("Directory: {}", project.root.display());
    println!();
    if project.signals.is_empty() {
        println!("No package manager markers found.");
    } else {
        println!("Signals:");
        for signal in &project.signals {
            let marker = if signal.kind == project.owner {
                "✓".green()
            } else {
                "○".normal()
            };
            println!("  {marker} {:<6} {}", signal.kind.label(), signal.source);
        }
    }
    println!();
    if project.owner.is_none() {
        println!("Owner: none (direct python is allowed)");
    } else {
        println!("Owner: {}", project.owner.to_string().bold());
        if let Some(wrapper) = project.run_wrapper() {
            println!("Run wrapper: {wrapper}");
        }
    }
}

fn list_policies(config: &Config, verbose: bool) {
    let enabled = config.enabled_policy_ids();
    println!("Policies:");
    println!();
    for policy in REGISTRY.all() {
        let status = if enabled.contains(policy.id) { "✓" } else { "○" };
        if verbose {
            println!("  {status} {} - {}", policy.id, policy.name);
            println!("      {}", policy.description);
        } else {
            println!("  {status} {} - {}", policy.id, policy.name);
        }
    }
    println!();
    println!("Legend: ✓ = enabled, ○ = disabled");
    println!();
    println!("Enable policies in ~/.config/ptg/config.toml or with PTG_POLICIES");
}

fn init_config(output: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            Config::write_sample(path, force)?;
            println!("Configuration written to: {}", path.display());
        }
        None => println!("{}", Config::generate_sample_config()),
    }
    Ok(())
}

fn show_config(config: &Config, root: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("# Config sources (lowest → highest priority):");
    let system = PathBuf::from("/etc/ptg/config.toml");
    if system.exists() {
        println!("#   system: {}", system.display());
    }
    if let Some(user) = Config::user_config_path().filter(|p| p.exists()) {
        println!("#   user: {}", user.display());
    }
    if let Some(project) = root
        .map(|r| r.join(crate::config::PROJECT_CONFIG_NAME))
        .filter(|p| p.exists())
    {
        println!("#   project: {}", project.display());
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}
