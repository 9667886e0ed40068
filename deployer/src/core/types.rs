//! Shared deterministic types for the deployment pipeline.
//!
//! These types define stable contracts between the steps and the runner. They
//! must not depend on external state or I/O.

use std::fmt;

/// The five pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Fetch,
    Update,
    WriteConfig,
    InstallDeps,
    Launch,
}

impl StepKind {
    /// Execution order of a deployment.
    pub const ALL: [StepKind; 5] = [
        StepKind::Fetch,
        StepKind::Update,
        StepKind::WriteConfig,
        StepKind::InstallDeps,
        StepKind::Launch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StepKind::Fetch => "fetch",
            StepKind::Update => "update",
            StepKind::WriteConfig => "write-config",
            StepKind::InstallDeps => "install",
            StepKind::Launch => "launch",
        }
    }

    /// Stage recorded when this step fails but the pipeline may continue.
    ///
    /// `None` means any failure of the step is fatal.
    pub fn tolerated_stage(self) -> Option<Stage> {
        match self {
            StepKind::Update => Some(Stage::UpdateFailed),
            _ => None,
        }
    }

    pub fn is_fatal_on_failure(self) -> bool {
        self.tolerated_stage().is_none()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Deployment lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Cloned,
    AlreadyPresent,
    Updated,
    UpdateFailed,
    ConfigWritten,
    DepsInstalled,
    ServiceStarted,
    Done,
    Aborted,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted)
    }
}

/// Result of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step succeeded; the pipeline moves to `stage`.
    Success(Stage),
    /// Step failed but the failure is tolerated; the pipeline moves to `stage`.
    Tolerated { stage: Stage, reason: String },
    /// Step failed fatally; the pipeline aborts with `exit_code`.
    Fatal { exit_code: i32, reason: String },
}

/// How a child process ended, stripped of any I/O handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, `None` when the child was killed by a signal or never ran.
    pub code: Option<i32>,
    /// The child exceeded its timeout and was killed.
    pub timed_out: bool,
    /// The child could not be spawned.
    pub spawn_error: Option<String>,
}

impl CommandStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn spawn_failed(err: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(err.into()),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.timed_out && self.spawn_error.is_none()
    }

    /// Short human-readable description, used in failure reasons.
    pub fn describe(&self) -> String {
        if let Some(err) = &self.spawn_error {
            return format!("spawn failed: {err}");
        }
        if self.timed_out {
            return "timed out".to_string();
        }
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_update_is_tolerated() {
        let tolerated: Vec<StepKind> = StepKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_fatal_on_failure())
            .collect();
        assert_eq!(tolerated, vec![StepKind::Update]);
    }

    #[test]
    fn status_success_requires_zero_code() {
        assert!(CommandStatus::exited(0).success());
        assert!(!CommandStatus::exited(2).success());
        assert!(!CommandStatus::default().success());
    }

    #[test]
    fn timed_out_zero_code_is_not_success() {
        let status = CommandStatus {
            code: Some(0),
            timed_out: true,
            spawn_error: None,
        };
        assert!(!status.success());
        assert_eq!(status.describe(), "timed out");
    }

    #[test]
    fn describe_prefers_spawn_error() {
        let status = CommandStatus::spawn_failed("No such file or directory");
        assert_eq!(
            status.describe(),
            "spawn failed: No such file or directory"
        );
        assert_eq!(CommandStatus::default().describe(), "terminated by signal");
        assert_eq!(CommandStatus::exited(3).describe(), "exit code 3");
    }
}
