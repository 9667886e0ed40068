//! Test-only helpers: scripted command runner, recording console, scratch roots.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::credential::SessionId;
use crate::core::types::CommandStatus;
use crate::io::config::DeployConfig;
use crate::io::console::Console;
use crate::io::process::{CommandResult, CommandRunner, CommandSpec};
use crate::steps::{DeployContext, Workspace};

struct Scripted {
    program: String,
    first_arg: String,
    result: CommandResult,
}

/// Command runner that records every spec and never spawns a process.
///
/// Commands without a scripted response succeed with exit code 0. A successful
/// `git clone` creates the destination directory, like the real clone would.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Vec<Scripted>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `<program> <first_arg> ...` with `result`.
    pub fn respond(mut self, program: &str, first_arg: &str, result: CommandResult) -> Self {
        self.responses.push(Scripted {
            program: program.to_string(),
            first_arg: first_arg.to_string(),
            result,
        });
        self
    }

    /// Answer `<program> <first_arg> ...` with exit code `code`.
    pub fn exit(self, program: &str, first_arg: &str, code: i32) -> Self {
        self.respond(
            program,
            first_arg,
            CommandResult::from_status(CommandStatus::exited(code)),
        )
    }

    /// All specs run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Number of runs of `<program> <first_arg> ...`.
    pub fn count(&self, program: &str, first_arg: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|spec| spec.is(program, first_arg))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        self.calls.borrow_mut().push(spec.clone());
        let result = self
            .responses
            .iter()
            .find(|scripted| spec.is(&scripted.program, &scripted.first_arg))
            .map(|scripted| scripted.result.clone())
            .unwrap_or_else(|| CommandResult::from_status(CommandStatus::exited(0)));

        if spec.is("git", "clone")
            && result.status.success()
            && let Some(dest) = spec.args.last()
        {
            let path = spec.cwd.join(dest);
            fs::create_dir_all(&path)
                .with_context(|| format!("simulate clone into {}", path.display()))?;
        }
        Ok(result)
    }
}

/// Console line severity, as recorded by [`RecordingConsole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Status,
    Warn,
    Error,
}

/// Console that keeps every line in memory.
#[derive(Default)]
pub struct RecordingConsole {
    lines: RefCell<Vec<(Level, String)>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(_, line)| line.contains(needle))
    }

    /// Index of the first line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines
            .borrow()
            .iter()
            .position(|(_, line)| line.contains(needle))
    }

    fn push(&self, level: Level, line: &str) {
        self.lines.borrow_mut().push((level, line.to_string()));
    }
}

impl Console for RecordingConsole {
    fn status(&self, line: &str) {
        self.push(Level::Status, line);
    }

    fn warn(&self, line: &str) {
        self.push(Level::Warn, line);
    }

    fn error(&self, line: &str) {
        self.push(Level::Error, line);
    }
}

/// Temporary deployment root using the default config.
pub struct TestRoot {
    dir: tempfile::TempDir,
}

impl TestRoot {
    /// Empty root: no working copy yet.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        Ok(Self { dir })
    }

    /// Root with an existing (empty) working copy directory.
    pub fn with_app_dir() -> Result<Self> {
        let root = Self::new()?;
        let app = root.app_path();
        fs::create_dir_all(&app).with_context(|| format!("create {}", app.display()))?;
        Ok(root)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn app_path(&self) -> PathBuf {
        DeployConfig::default().app_path(self.path())
    }

    /// Deploy context for this root with the default config.
    pub fn context(&self, session: &str) -> DeployContext {
        self.context_with(DeployConfig::default(), session)
    }

    pub fn context_with(&self, config: DeployConfig, session: &str) -> DeployContext {
        let session = SessionId::new(session).expect("valid test credential");
        let workspace = Workspace::new(self.path(), config).expect("valid test config");
        DeployContext::new(workspace, session)
    }

    /// Workspace for this root with the default config.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.path(), DeployConfig::default()).expect("valid test config")
    }
}
