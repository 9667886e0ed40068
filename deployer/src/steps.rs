//! The five deployment steps.
//!
//! Each step prints its console status lines, performs one side effect and
//! reports a typed [`StepOutcome`]. Steps never exit the process; the runner in
//! [`crate::deploy`] applies the continue/abort policy.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::config_env::render_config_env;
use crate::core::credential::SessionId;
use crate::core::policy::classify;
use crate::core::types::{Stage, StepKind, StepOutcome};
use crate::exit_codes;
use crate::io::config::DeployConfig;
use crate::io::console::Console;
use crate::io::git::Git;
use crate::io::process::{CommandResult, CommandRunner, CommandSpec};

/// Deployment root plus validated config: where things live and what to run.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: DeployConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: DeployConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: root.into(),
            config,
        })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn app_path(&self) -> PathBuf {
        self.config.app_path(&self.root)
    }

    pub fn config_env_path(&self) -> PathBuf {
        self.config.config_env_path(&self.root)
    }

    pub fn clone_command(&self) -> CommandSpec {
        Git::new(&self.root).clone_into(&self.config.repo_url, &self.config.app_dir)
    }

    pub fn pull_command(&self) -> CommandSpec {
        Git::new(self.app_path()).pull()
    }

    pub fn install_command(&self) -> Result<CommandSpec> {
        CommandSpec::from_argv(&self.config.install.command, self.app_path())
    }

    pub fn launch_command(&self) -> Result<CommandSpec> {
        Ok(CommandSpec::from_argv(&self.config.launch.command, self.app_path())?.captured())
    }
}

/// Everything a deployment needs, validated up front.
///
/// Holding a [`SessionId`] is the proof that the credential precondition was
/// met before any step runs.
#[derive(Debug, Clone)]
pub struct DeployContext {
    workspace: Workspace,
    session: SessionId,
}

impl DeployContext {
    pub fn new(workspace: Workspace, session: SessionId) -> Self {
        Self { workspace, session }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

/// Run one step by kind.
pub fn run_step<R: CommandRunner, C: Console>(
    kind: StepKind,
    ctx: &DeployContext,
    runner: &R,
    console: &C,
) -> Result<StepOutcome> {
    match kind {
        StepKind::Fetch => fetch_repository(ctx, runner, console),
        StepKind::Update => update_repository(ctx, runner, console),
        StepKind::WriteConfig => Ok(write_config_env(ctx, console)),
        StepKind::InstallDeps => install_dependencies(ctx, runner, console),
        StepKind::Launch => launch_service(ctx, runner, console),
    }
}

/// Clone the repository unless the working copy already exists.
#[instrument(skip_all, fields(app_path = %ctx.workspace().app_path().display()))]
pub fn fetch_repository<R: CommandRunner, C: Console>(
    ctx: &DeployContext,
    runner: &R,
    console: &C,
) -> Result<StepOutcome> {
    let ws = ctx.workspace();
    if ws.app_path().exists() {
        debug!("working copy present, skipping clone");
        console.status("📁 Repository already exists, skipping clone.");
        return Ok(StepOutcome::Success(Stage::AlreadyPresent));
    }

    console.status("🚀 Cloning repository...");
    info!(repo_url = %ws.config().repo_url, "cloning repository");
    let spec = ws.clone_command();
    let result = runner.run(&spec)?;
    let outcome = classify(
        StepKind::Fetch,
        &result.status,
        Stage::Cloned,
        "git clone failed",
    );
    if !matches!(outcome, StepOutcome::Success(_)) {
        console.error("❌ Failed to clone repository.");
    }
    Ok(outcome)
}

/// Best-effort `git pull`; failure is tolerated.
#[instrument(skip_all)]
pub fn update_repository<R: CommandRunner, C: Console>(
    ctx: &DeployContext,
    runner: &R,
    console: &C,
) -> Result<StepOutcome> {
    console.status("🔄 Pulling latest updates...");
    let result = runner.run(&ctx.workspace().pull_command())?;
    let outcome = classify(
        StepKind::Update,
        &result.status,
        Stage::Updated,
        "git pull failed",
    );
    if let StepOutcome::Tolerated { reason, .. } = &outcome {
        warn!(%reason, "continuing with possibly stale working copy");
        console.warn("⚠️ Failed to pull latest updates. You may need to check manually.");
    }
    Ok(outcome)
}

/// Overwrite the runtime config file with the session credential.
///
/// A write failure is fatal.
#[instrument(skip_all, fields(path = %ctx.workspace().config_env_path().display()))]
pub fn write_config_env<C: Console>(ctx: &DeployContext, console: &C) -> StepOutcome {
    let ws = ctx.workspace();
    console.status(&format!("🛠️ Writing {}...", ws.config().config_file));
    let path = ws.config_env_path();
    match fs::write(&path, render_config_env(ctx.session())) {
        Ok(()) => StepOutcome::Success(Stage::ConfigWritten),
        Err(err) => {
            let reason = format!("write {}: {err}", path.display());
            console.error(&format!("❌ Failed to write {}: {err}", path.display()));
            StepOutcome::Fatal {
                exit_code: exit_codes::FAILURE,
                reason,
            }
        }
    }
}

/// Install dependencies with the configured package manager command.
#[instrument(skip_all)]
pub fn install_dependencies<R: CommandRunner, C: Console>(
    ctx: &DeployContext,
    runner: &R,
    console: &C,
) -> Result<StepOutcome> {
    console.status("📦 Installing dependencies...");
    let spec = ctx.workspace().install_command()?;
    let result = runner.run(&spec)?;
    let outcome = classify(
        StepKind::InstallDeps,
        &result.status,
        Stage::DepsInstalled,
        &format!("{spec} failed"),
    );
    if !matches!(outcome, StepOutcome::Success(_)) {
        console.error("❌ Failed to install dependencies.");
    }
    Ok(outcome)
}

/// Start or reload the app under the supervisor, logging its captured output.
#[instrument(skip_all)]
pub fn launch_service<R: CommandRunner, C: Console>(
    ctx: &DeployContext,
    runner: &R,
    console: &C,
) -> Result<StepOutcome> {
    console.status("🔥 Starting PM2...");
    let spec = ctx.workspace().launch_command()?;
    let result = runner.run(&spec)?;
    report_launch_output(&result, console);

    let outcome = classify(
        StepKind::Launch,
        &result.status,
        Stage::ServiceStarted,
        &format!("{spec} failed"),
    );
    if !matches!(outcome, StepOutcome::Success(_)) {
        console.error("❌ PM2 failed to start. Check logs above for details.");
    }
    Ok(outcome)
}

fn report_launch_output<C: Console>(result: &CommandResult, console: &C) {
    let stdout = result.stdout_text();
    let stderr = result.stderr_text();
    console.status(&format!(
        "📜 PM2 stdout: {}{}",
        if stdout.is_empty() { "No stdout" } else { stdout.as_str() },
        result.stdout_truncated_notice("PM2")
    ));
    console.status(&format!(
        "⚠️ PM2 stderr: {}{}",
        if stderr.is_empty() { "No stderr" } else { stderr.as_str() },
        result.stderr_truncated_notice("PM2")
    ));
    if let Some(err) = &result.status.spawn_error {
        console.error(&format!("💥 PM2 spawn error: {err}"));
    }
    let code = result
        .status
        .code
        .map_or_else(|| "none".to_string(), |code| code.to_string());
    console.status(&format!("📊 PM2 exit code: {code}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CommandStatus;
    use crate::test_support::{RecordingConsole, ScriptedRunner, TestRoot};

    #[test]
    fn fetch_skips_clone_when_working_copy_exists() {
        let root = TestRoot::with_app_dir().expect("root");
        let runner = ScriptedRunner::new();
        let console = RecordingConsole::default();

        let outcome = fetch_repository(&root.context("abc"), &runner, &console).expect("fetch");
        assert_eq!(outcome, StepOutcome::Success(Stage::AlreadyPresent));
        assert!(runner.calls().is_empty());
        assert!(console.contains("Repository already exists"));
    }

    #[test]
    fn write_config_overwrites_previous_content() {
        let root = TestRoot::with_app_dir().expect("root");
        let ctx = root.context("fresh-id");
        let path = ctx.workspace().config_env_path();
        fs::write(&path, "VPS=false\nSESSION_ID=old\nEXTRA=1\n").expect("seed");

        let outcome = write_config_env(&ctx, &RecordingConsole::default());
        assert_eq!(outcome, StepOutcome::Success(Stage::ConfigWritten));
        let written = fs::read_to_string(&path).expect("read");
        assert_eq!(written, "VPS=true\nSESSION_ID=fresh-id");
    }

    #[test]
    fn write_config_failure_is_fatal() {
        let root = TestRoot::new().expect("root");
        let console = RecordingConsole::default();

        let outcome = write_config_env(&root.context("abc"), &console);
        match outcome {
            StepOutcome::Fatal { exit_code, .. } => assert_eq!(exit_code, exit_codes::FAILURE),
            other => panic!("expected fatal, got {other:?}"),
        }
        assert!(console.contains("❌ Failed to write"));
    }

    #[test]
    fn launch_reports_spawn_error_and_missing_code() {
        let root = TestRoot::with_app_dir().expect("root");
        let runner = ScriptedRunner::new().respond(
            "yarn",
            "pm2",
            CommandResult::from_status(CommandStatus::spawn_failed("No such file or directory")),
        );
        let console = RecordingConsole::default();

        let outcome = launch_service(&root.context("abc"), &runner, &console).expect("launch");
        assert!(matches!(outcome, StepOutcome::Fatal { exit_code: 1, .. }));
        assert!(console.contains("📜 PM2 stdout: No stdout"));
        assert!(console.contains("⚠️ PM2 stderr: No stderr"));
        assert!(console.contains("💥 PM2 spawn error: No such file or directory"));
        assert!(console.contains("📊 PM2 exit code: none"));
    }

    #[test]
    fn launch_notes_truncated_output() {
        let root = TestRoot::with_app_dir().expect("root");
        let runner = ScriptedRunner::new().respond(
            "yarn",
            "pm2",
            CommandResult {
                status: CommandStatus::exited(0),
                stdout: b"[PM2] App online".to_vec(),
                stdout_truncated: 2048,
                ..CommandResult::default()
            },
        );
        let console = RecordingConsole::default();

        let outcome = launch_service(&root.context("abc"), &runner, &console).expect("launch");
        assert_eq!(outcome, StepOutcome::Success(Stage::ServiceStarted));
        assert!(console.contains("📜 PM2 stdout: [PM2] App online\n[PM2 stdout truncated 2048 bytes]"));
        assert!(console.contains("⚠️ PM2 stderr: No stderr"));
        assert!(!console.contains("stderr truncated"));
    }

    #[test]
    fn launch_command_is_captured_in_working_copy() {
        let root = TestRoot::with_app_dir().expect("root");
        let ws = root.workspace();
        let spec = ws.launch_command().expect("spec");
        assert_eq!(spec.output, crate::io::process::OutputMode::Capture);
        assert_eq!(spec.cwd, ws.app_path());
        assert_eq!(spec.to_string(), "yarn pm2 startOrReload ecosystem.config.js");
    }
}
