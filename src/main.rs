#![forbid(unsafe_code)]
//! Project Tool Guard (ptg) hook binary.
//!
//! Runs before every Bash tool call. It reads the call as JSON on stdin,
//! works out which package manager owns the project, and blocks commands
//! that bypass it.
//!
//! Exit behavior:
//!   - Exit 0 = allow (also for every internal error)
//!   - Exit 2 = block, explanation and suggestion on stderr

use clap::Parser;
use colored::Colorize;
use project_tool_guard::cli::{self, Cli};
use project_tool_guard::config::Config;
use project_tool_guard::evaluator::evaluate_with_deadline;
use project_tool_guard::hook::{self, EXIT_ALLOW, EXIT_BLOCK, HookReadError};
use project_tool_guard::logging::{self, DecisionLogger};
use project_tool_guard::perf::{Deadline, HOOK_EVALUATION_BUDGET};
use project_tool_guard::policies::REGISTRY;
use std::panic;
use std::path::PathBuf;

// Build metadata from vergen (set by build.rs)
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");
const CARGO_TARGET: Option<&str> = option_env!("VERGEN_CARGO_TARGET_TRIPLE");

fn print_version() {
    eprintln!();
    eprintln!("  {} {}", "Project Tool Guard".white().bold(), format!("ptg v{PKG_VERSION}").cyan().bold());
    if let Some(ts) = BUILD_TIMESTAMP {
        let date = ts.split('T').next().unwrap_or(ts);
        eprintln!("    {} {}", "Built:".bright_black(), date.white());
    }
    if let Some(rustc) = RUSTC_SEMVER {
        eprintln!("    {} {}", "Rustc:".bright_black(), rustc.white());
    }
    if let Some(target) = CARGO_TARGET {
        eprintln!("    {} {}", "Target:".bright_black(), target.white());
    }
    eprintln!();
}

fn print_help() {
    eprintln!();
    eprintln!("  {} {}", "ptg".green().bold(), PKG_VERSION.cyan());
    eprintln!(
        "     {}",
        "Project Tool Guard - keeps agents on the project's package manager".bright_black()
    );
    eprintln!();

    eprintln!("  {}", "USAGE".yellow().bold());
    eprintln!("  {}", "─".repeat(50).bright_black());
    eprintln!("    Runs as a {} hook: JSON on stdin, verdict as exit code.", "PreToolUse".cyan());
    eprintln!("    Exit 0 allows the command, exit 2 blocks it.");
    eprintln!();
    eprintln!("    Add to {}:", "~/.claude/settings.json".cyan());
    eprintln!(
        "      {}",
        r#"{"hooks": {"PreToolUse": [{"matcher": "Bash","#.white()
    );
    eprintln!(
        "        {}",
        r#""hooks": [{"type": "command", "command": "ptg"}]}]}}"#.white()
    );
    eprintln!();

    eprintln!("  {}", "COMMANDS".yellow().bold());
    eprintln!("  {}", "─".repeat(50).bright_black());
    eprintln!("    {}  Evaluate a command and print the decision", "test <cmd>".green());
    eprintln!("    {}      Show manager markers and the resolved owner", "detect".green());
    eprintln!("    {}    List policies", "policies".green());
    eprintln!("    {}        Print or write a sample config", "init".green());
    eprintln!("    {}      Show the effective config", "config".green());
    eprintln!();

    eprintln!("  {}", "POLICIES".yellow().bold());
    eprintln!("  {}", "─".repeat(50).bright_black());
    for policy in REGISTRY.all() {
        let state = if policy.default_enabled { "on" } else { "opt-in" };
        eprintln!("    {} {}", policy.id.red().bold(), format!("({state})").bright_black());
        eprintln!("      {}", policy.name);
    }
    eprintln!();

    eprintln!("  {}", "ENVIRONMENT".yellow().bold());
    eprintln!("  {}", "─".repeat(50).bright_black());
    eprintln!("    {}  Project root to scan", hook::PROJECT_DIR_ENV.cyan());
    eprintln!("    {}        Comma-separated policies to enable", "PTG_POLICIES".cyan());
    eprintln!("    {}         Comma-separated policies to disable", "PTG_DISABLE".cyan());
    eprintln!("    {}          Extra config file", "PTG_CONFIG".cyan());
    eprintln!("    {}          Allow everything", "PTG_BYPASS".cyan());
    eprintln!("    {}           Diagnostic tracing filter (e.g. debug)", "PTG_TRACE".cyan());
    eprintln!();
}

fn main() {
    logging::init_tracing();
    hook::configure_colors();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--version" | "-V") => {
            print_version();
            return;
        }
        Some("--help" | "-h") => {
            print_help();
            return;
        }
        _ => {}
    }

    // Exit 2 means "block" to the hook runtime, so usage errors use 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if cli.command.is_some() {
        if let Err(e) = cli::run_command(cli) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    std::process::exit(run_hook_mode());
}

/// Hook mode with every failure mapped to allow.
fn run_hook_mode() -> i32 {
    if Config::is_bypassed() {
        return EXIT_ALLOW;
    }

    let root_override = hook::project_root_override();
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| {
        tracing::error!(%info, "hook pipeline panicked, allowing");
    }));
    let outcome = panic::catch_unwind(move || evaluate_hook_input(root_override));
    panic::set_hook(previous);

    outcome.unwrap_or(EXIT_ALLOW)
}

fn evaluate_hook_input(root_override: Option<PathBuf>) -> i32 {
    let config_root = root_override
        .clone()
        .or_else(|| std::env::current_dir().ok());
    let config = Config::load(config_root.as_deref());

    let max_input_bytes = config.general.max_hook_input_bytes();
    let input = match hook::read_hook_input(max_input_bytes) {
        Ok(input) => input,
        Err(HookReadError::InputTooLarge(len)) => {
            eprintln!(
                "[ptg] Warning: stdin input ({len} bytes) exceeds limit ({max_input_bytes} bytes); allowing command (fail-open)"
            );
            return EXIT_ALLOW;
        }
        Err(e) => {
            if config.general.verbose {
                eprintln!("[ptg] {e}; allowing command (fail-open)");
            }
            return EXIT_ALLOW;
        }
    };

    let deadline = Deadline::new(HOOK_EVALUATION_BUDGET);
    let request = input.into_request(root_override);
    if request.raw_command.trim().is_empty() {
        return EXIT_ALLOW;
    }

    let max_command_bytes = config.general.max_command_bytes();
    if request.raw_command.len() > max_command_bytes {
        eprintln!(
            "[ptg] Warning: command ({} bytes) exceeds limit ({max_command_bytes} bytes); allowing command (fail-open)",
            request.raw_command.len()
        );
        return EXIT_ALLOW;
    }

    let ctx = config.eval_context(request.effective_root());
    let result = evaluate_with_deadline(&request, ctx, Some(&deadline));

    if let Some(logger) = DecisionLogger::new(&config.logging) {
        logger.log(&result, &request.raw_command);
    }

    if result.skipped_due_to_budget {
        if let Some(log_file) = config.general.log_file.as_deref() {
            let _ = hook::log_budget_skip(
                log_file,
                &request.raw_command,
                deadline.elapsed(),
                HOOK_EVALUATION_BUDGET,
            );
        }
        if config.general.verbose {
            eprintln!("[ptg] evaluation budget exceeded; allowing command (fail-open)");
        }
        return EXIT_ALLOW;
    }

    if result.decision.allow {
        return EXIT_ALLOW;
    }

    hook::print_block_message(&result.decision);
    if let Some(log_file) = config.general.log_file.as_deref() {
        if let Err(e) = hook::log_blocked_command(log_file, &request.raw_command, &result.decision) {
            tracing::warn!(error = %e, "cannot write blocked-command log");
        }
    }
    EXIT_BLOCK
}
