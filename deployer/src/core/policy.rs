//! Uniform continue/abort policy applied by the pipeline runner.

use crate::core::types::{CommandStatus, Stage, StepKind, StepOutcome};
use crate::exit_codes;

/// What the runner does after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Continue(Stage),
    Abort { exit_code: i32, reason: String },
}

pub fn next(outcome: &StepOutcome) -> Next {
    match outcome {
        StepOutcome::Success(stage) | StepOutcome::Tolerated { stage, .. } => Next::Continue(*stage),
        StepOutcome::Fatal { exit_code, reason } => Next::Abort {
            exit_code: *exit_code,
            reason: reason.clone(),
        },
    }
}

/// Turn a finished command into a step outcome according to the step's policy.
///
/// `success` is the stage reached when the command succeeds; `failure` describes
/// the failure for console and logs.
pub fn classify(
    kind: StepKind,
    status: &CommandStatus,
    success: Stage,
    failure: &str,
) -> StepOutcome {
    if status.success() {
        return StepOutcome::Success(success);
    }
    let reason = format!("{failure} ({})", status.describe());
    match kind.tolerated_stage() {
        Some(stage) => StepOutcome::Tolerated { stage, reason },
        None => StepOutcome::Fatal {
            exit_code: fatal_exit_code(status),
            reason,
        },
    }
}

/// Exit code for a fatal command: the child's own non-zero code, else `FAILURE`.
pub fn fatal_exit_code(status: &CommandStatus) -> i32 {
    match status.code {
        Some(code) if code != 0 && !status.timed_out => code,
        _ => exit_codes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_continues() {
        let outcome = classify(
            StepKind::Fetch,
            &CommandStatus::exited(0),
            Stage::Cloned,
            "clone failed",
        );
        assert_eq!(outcome, StepOutcome::Success(Stage::Cloned));
        assert_eq!(next(&outcome), Next::Continue(Stage::Cloned));
    }

    #[test]
    fn update_failure_is_tolerated() {
        let outcome = classify(
            StepKind::Update,
            &CommandStatus::exited(1),
            Stage::Updated,
            "pull failed",
        );
        assert_eq!(
            outcome,
            StepOutcome::Tolerated {
                stage: Stage::UpdateFailed,
                reason: "pull failed (exit code 1)".to_string(),
            }
        );
        assert_eq!(next(&outcome), Next::Continue(Stage::UpdateFailed));
    }

    #[test]
    fn install_failure_propagates_child_code() {
        let outcome = classify(
            StepKind::InstallDeps,
            &CommandStatus::exited(127),
            Stage::DepsInstalled,
            "install failed",
        );
        match next(&outcome) {
            Next::Abort { exit_code, reason } => {
                assert_eq!(exit_code, 127);
                assert!(reason.contains("exit code 127"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn codeless_failures_map_to_generic_failure() {
        assert_eq!(
            fatal_exit_code(&CommandStatus::spawn_failed("not found")),
            exit_codes::FAILURE
        );
        assert_eq!(fatal_exit_code(&CommandStatus::default()), exit_codes::FAILURE);
        let timed_out = CommandStatus {
            code: Some(137),
            timed_out: true,
            spawn_error: None,
        };
        assert_eq!(fatal_exit_code(&timed_out), exit_codes::FAILURE);
    }
}
