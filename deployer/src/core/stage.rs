//! Legal transitions of the deployment lifecycle.
//!
//! ```text
//! Idle -> Cloned | AlreadyPresent
//!      -> Updated | UpdateFailed
//!      -> ConfigWritten -> DepsInstalled -> ServiceStarted -> Done
//! ```
//!
//! Any non-terminal stage may move to `Aborted`.

use crate::core::types::Stage;

/// Stages that may directly follow `from`, excluding `Aborted`.
pub fn successors(from: Stage) -> &'static [Stage] {
    match from {
        Stage::Idle => &[Stage::Cloned, Stage::AlreadyPresent],
        Stage::Cloned | Stage::AlreadyPresent => &[Stage::Updated, Stage::UpdateFailed],
        Stage::Updated | Stage::UpdateFailed => &[Stage::ConfigWritten],
        Stage::ConfigWritten => &[Stage::DepsInstalled],
        Stage::DepsInstalled => &[Stage::ServiceStarted],
        Stage::ServiceStarted => &[Stage::Done],
        Stage::Done | Stage::Aborted => &[],
    }
}

/// Check that moving from `from` to `to` is a legal lifecycle transition.
pub fn ensure_transition(from: Stage, to: Stage) -> Result<(), String> {
    if from.is_terminal() {
        return Err(format!("{from:?} is terminal (attempted {to:?})"));
    }
    if to == Stage::Aborted || successors(from).contains(&to) {
        return Ok(());
    }
    Err(format!("illegal transition {from:?} -> {to:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            Stage::Idle,
            Stage::Cloned,
            Stage::Updated,
            Stage::ConfigWritten,
            Stage::DepsInstalled,
            Stage::ServiceStarted,
            Stage::Done,
        ];
        for pair in path.windows(2) {
            ensure_transition(pair[0], pair[1]).expect("legal transition");
        }
    }

    #[test]
    fn update_failure_continues_to_config() {
        ensure_transition(Stage::AlreadyPresent, Stage::UpdateFailed).expect("legal");
        ensure_transition(Stage::UpdateFailed, Stage::ConfigWritten).expect("legal");
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let err = ensure_transition(Stage::Cloned, Stage::ConfigWritten).unwrap_err();
        assert!(err.contains("illegal transition"));
    }

    #[test]
    fn abort_allowed_from_any_non_terminal_stage() {
        ensure_transition(Stage::Idle, Stage::Aborted).expect("legal");
        ensure_transition(Stage::DepsInstalled, Stage::Aborted).expect("legal");
        assert!(ensure_transition(Stage::Done, Stage::Aborted).is_err());
        assert!(ensure_transition(Stage::Aborted, Stage::Aborted).is_err());
    }
}
