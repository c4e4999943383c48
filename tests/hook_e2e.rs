//! End-to-end tests for hook mode.
//!
//! Each test builds a throwaway project directory, points
//! `CLAUDE_PROJECT_DIR` at it and feeds one hook payload to the `ptg`
//! binary, checking the exit status and stderr.
//!
//! # Running
//!
//! ```bash
//! cargo test --test hook_e2e
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Path to the ptg binary (built in debug mode for tests).
fn ptg_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps/
    path.push("ptg");
    path
}

#[derive(Debug)]
struct HookRunOutput {
    command: String,
    output: std::process::Output,
}

impl HookRunOutput {
    fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).to_string()
    }

    #[track_caller]
    fn assert_allowed(&self) {
        assert_eq!(
            self.code(),
            Some(0),
            "expected `{}` to be allowed, stderr: {}",
            self.command,
            self.stderr_str()
        );
    }

    #[track_caller]
    fn assert_blocked(&self) -> String {
        assert_eq!(
            self.code(),
            Some(2),
            "expected `{}` to be blocked, stderr: {}",
            self.command,
            self.stderr_str()
        );
        self.stderr_str()
    }
}

/// A project directory plus an isolated HOME so no user config leaks in.
struct Sandbox {
    temp: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        for dir in ["project", "home", "xdg_config"] {
            std::fs::create_dir_all(temp.path().join(dir)).expect("failed to create dir");
        }
        Self { temp }
    }

    fn project(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    fn write(&self, name: &str, content: &str) -> &Self {
        let path = self.project().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(path, content).expect("failed to write marker");
        self
    }

    fn mkdir(&self, name: &str) -> &Self {
        std::fs::create_dir_all(self.project().join(name)).expect("failed to create dir");
        self
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(ptg_binary());
        cmd.env_clear()
            .env("HOME", self.temp.path().join("home"))
            .env("XDG_CONFIG_HOME", self.temp.path().join("xdg_config"))
            .env("CLAUDE_PROJECT_DIR", self.project())
            .current_dir(self.temp.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run_raw(&self, stdin: &[u8], extra_env: &[(&str, &str)]) -> std::process::Output {
        let mut cmd = self.base_command();
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        let mut child = cmd.spawn().expect("failed to spawn ptg hook mode");
        {
            let mut pipe = child.stdin.take().expect("failed to open stdin");
            // The binary may exit before reading everything; ignore EPIPE.
            let _ = pipe.write_all(stdin);
        }
        child.wait_with_output().expect("failed to wait for ptg")
    }

    fn run_with_env(&self, command: &str, extra_env: &[(&str, &str)]) -> HookRunOutput {
        let input = serde_json::json!({
            "tool_name": "Bash",
            "tool_input": { "command": command },
        });
        let bytes = serde_json::to_vec(&input).expect("failed to encode hook input");
        HookRunOutput {
            command: command.to_string(),
            output: self.run_raw(&bytes, extra_env),
        }
    }

    fn run(&self, command: &str) -> HookRunOutput {
        self.run_with_env(command, &[])
    }
}

fn poetry_manifest() -> &'static str {
    "[tool.poetry]\nname = \"app\"\nversion = \"0.1.0\"\n"
}

mod ownership {
    use super::*;

    #[test]
    fn poetry_lock_alone_blocks_direct_python() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        let stderr = sandbox.run("python app.py").assert_blocked();
        assert!(stderr.contains("Direct python blocked"), "{stderr}");
        assert!(stderr.contains("poetry run python app.py"), "{stderr}");
    }

    #[test]
    fn poetry_outranks_uv() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "").write("uv.lock", "");
        let stderr = sandbox.run("python3 -m pytest").assert_blocked();
        assert!(stderr.contains("poetry run python3 -m pytest"), "{stderr}");
        assert!(!stderr.contains("uv run"), "{stderr}");
    }

    #[test]
    fn poetry_section_outranks_pdm_section() {
        let sandbox = Sandbox::new();
        sandbox.write(
            "pyproject.toml",
            "[tool.pdm]\ndistribution = true\n\n[tool.poetry]\nname = \"app\"\n",
        );
        let stderr = sandbox.run("python main.py").assert_blocked();
        assert!(stderr.contains("Project uses poetry"), "{stderr}");
    }

    #[test]
    fn plain_python_version_means_uv() {
        let sandbox = Sandbox::new();
        sandbox.write(".python-version", "3.12\n");
        let stderr = sandbox.run("python script.py").assert_blocked();
        assert!(stderr.contains("uv run python script.py"), "{stderr}");
    }

    #[test]
    fn python_version_mentioning_rye_means_rye() {
        let sandbox = Sandbox::new();
        sandbox.write(".python-version", "# managed by rye\n3.12\n");
        let stderr = sandbox.run("python script.py").assert_blocked();
        assert!(stderr.contains("rye run python script.py"), "{stderr}");
    }

    #[test]
    fn python_version_with_rye_dir_means_rye() {
        let sandbox = Sandbox::new();
        sandbox.write(".python-version", "3.12\n").mkdir(".rye");
        let stderr = sandbox.run("python script.py").assert_blocked();
        assert!(stderr.contains("rye run python script.py"), "{stderr}");
    }

    #[test]
    fn conda_environment_name_fills_wrapper() {
        let sandbox = Sandbox::new();
        sandbox.write("environment.yml", "name: science\ndependencies:\n  - numpy\n");
        let stderr = sandbox.run("python fit.py").assert_blocked();
        assert!(stderr.contains("conda run -n science python fit.py"), "{stderr}");
    }

    #[test]
    fn no_markers_allows_python() {
        let sandbox = Sandbox::new();
        sandbox.run("python app.py").assert_allowed();
    }

    #[test]
    fn block_message_names_the_marker() {
        let sandbox = Sandbox::new();
        sandbox.write("pyproject.toml", poetry_manifest());
        let stderr = sandbox.run("python app.py").assert_blocked();
        assert!(stderr.contains("Detected from"), "{stderr}");
        assert!(stderr.contains("[tool.poetry]"), "{stderr}");
    }
}

mod classification {
    use super::*;

    fn poetry_sandbox() -> Sandbox {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        sandbox
    }

    #[test]
    fn runtime_substring_is_not_a_runtime() {
        poetry_sandbox()
            .run("./mypython_script.sh --flag")
            .assert_allowed();
    }

    #[test]
    fn bootstrap_commands_are_allowed() {
        let sandbox = poetry_sandbox();
        for command in [
            "python -m pip install --upgrade pip",
            "python -m poetry --version",
            "python3 -m uv sync",
        ] {
            sandbox.run(command).assert_allowed();
        }
    }

    #[test]
    fn stdlib_modules_are_not_bootstrap() {
        let sandbox = poetry_sandbox();
        for command in ["python3 -m venv .venv", "python -m ensurepip"] {
            let stderr = sandbox.run(command).assert_blocked();
            assert!(stderr.contains("poetry run"), "{stderr}");
        }
    }

    #[test]
    fn bootstrap_is_allowed_without_markers() {
        let sandbox = Sandbox::new();
        sandbox.run("python -m pip install poetry").assert_allowed();
        sandbox.run("python3 -m uv --version").assert_allowed();
    }

    #[test]
    fn bootstrap_is_allowed_under_conflicting_markers() {
        let sandbox = Sandbox::new();
        sandbox
            .write("poetry.lock", "")
            .write("uv.lock", "")
            .write("pyproject.toml", "[tool.pdm]\ndistribution = true\n");
        for command in [
            "python -m poetry lock",
            "python3 -m uv sync",
            "python -m pdm install",
        ] {
            sandbox.run(command).assert_allowed();
        }
        sandbox.run("python app.py").assert_blocked();
    }

    #[test]
    fn wrapped_invocations_are_allowed() {
        let sandbox = poetry_sandbox();
        for command in [
            "poetry run python app.py",
            "uv run python -m pytest",
            "conda run -n base python x.py",
        ] {
            sandbox.run(command).assert_allowed();
        }
    }

    #[test]
    fn suggested_command_is_allowed() {
        let sandbox = poetry_sandbox();
        let stderr = sandbox.run("python -m pytest -q").assert_blocked();
        assert!(stderr.contains("poetry run python -m pytest -q"), "{stderr}");
        sandbox.run("poetry run python -m pytest -q").assert_allowed();
    }

    #[test]
    fn unrelated_commands_are_allowed() {
        let sandbox = poetry_sandbox();
        for command in ["ls -la", "git status", "cargo build", "echo python"] {
            sandbox.run(command).assert_allowed();
        }
    }

    #[test]
    fn repeated_evaluation_is_stable() {
        let sandbox = poetry_sandbox();
        let first = sandbox.run("python app.py");
        let second = sandbox.run("python app.py");
        assert_eq!(first.code(), second.code());
        assert_eq!(first.stderr_str(), second.stderr_str());
    }
}

mod fail_open {
    use super::*;

    #[test]
    fn empty_stdin_is_allowed() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        let output = sandbox.run_raw(b"", &[]);
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn malformed_json_is_allowed() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        let output = sandbox.run_raw(b"{\"tool_name\": \"Bash\", ", &[]);
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn missing_command_is_allowed() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        let output = sandbox.run_raw(br#"{"tool_name": "Bash", "tool_input": {}}"#, &[]);
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn empty_command_is_allowed() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        sandbox.run("   ").assert_allowed();
    }

    #[test]
    fn oversized_input_is_allowed_with_warning() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        let command = format!("python {}", "x".repeat(300 * 1024));
        let result = sandbox.run(&command);
        result.assert_allowed();
        assert!(result.stderr_str().contains("exceeds limit"));
    }

    #[test]
    fn missing_project_dir_is_allowed() {
        let sandbox = Sandbox::new();
        let missing = sandbox.temp.path().join("does-not-exist");
        let missing = missing.to_string_lossy().to_string();
        sandbox
            .run_with_env("python app.py", &[("CLAUDE_PROJECT_DIR", &missing)])
            .assert_allowed();
    }

    #[test]
    fn bypass_env_allows_everything() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        sandbox
            .run_with_env("python app.py", &[("PTG_BYPASS", "1")])
            .assert_allowed();
    }

    #[test]
    fn falsy_bypass_env_does_not_bypass() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        for value in ["0", "false"] {
            sandbox
                .run_with_env("python app.py", &[("PTG_BYPASS", value)])
                .assert_blocked();
        }
    }
}

mod configuration {
    use super::*;

    #[test]
    fn project_config_enables_timeout_policy() {
        let sandbox = Sandbox::new();
        sandbox.write(".ptg.toml", "[policies]\nenabled = [\"native_timeout\"]\n");
        let stderr = sandbox.run("timeout 30 make test").assert_blocked();
        assert!(stderr.contains("Direct timeout blocked"), "{stderr}");
        assert!(stderr.contains("timeout=30000"), "{stderr}");
    }

    #[test]
    fn env_disables_python_policy() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        sandbox
            .run_with_env("python app.py", &[("PTG_DISABLE", "python_manager")])
            .assert_allowed();
    }

    #[test]
    fn env_enables_github_write_policy() {
        let sandbox = Sandbox::new();
        let stderr = sandbox
            .run_with_env("gh pr create --fill", &[("PTG_POLICIES", "github_write")])
            .assert_blocked();
        assert!(stderr.contains("GitHub write blocked"), "{stderr}");
    }

    #[test]
    fn blocked_commands_are_logged_when_configured() {
        let sandbox = Sandbox::new();
        let log = sandbox.temp.path().join("blocked.log");
        sandbox.write("poetry.lock", "").write(
            ".ptg.toml",
            &format!("[general]\nlog_file = {:?}\n", log.to_string_lossy()),
        );
        sandbox.run("python app.py").assert_blocked();
        let content = std::fs::read_to_string(&log).expect("log file should exist");
        assert!(content.contains("[python_manager]"), "{content}");
        assert!(content.contains("Command: python app.py"), "{content}");
    }

    #[test]
    fn no_files_are_written_by_default() {
        let sandbox = Sandbox::new();
        sandbox.write("poetry.lock", "");
        sandbox.run("python app.py").assert_blocked();
        let entries: Vec<_> = std::fs::read_dir(sandbox.project())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "{entries:?}");
        assert!(is_empty_dir(&sandbox.temp.path().join("home")));
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).map_or(true, |mut d| d.next().is_none())
    }
}
