//! Ordered-steps runner for `deployer deploy`.

use anyhow::{Result, anyhow};
use tracing::{debug, error, info};

use crate::core::policy::{Next, next};
use crate::core::stage::ensure_transition;
use crate::core::types::{Stage, StepKind, StepOutcome};
use crate::exit_codes;
use crate::io::console::Console;
use crate::io::process::{CommandRunner, CommandSpec};
use crate::steps::{DeployContext, Workspace, run_step};

/// One executed step, handed to the `on_step` observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub kind: StepKind,
    pub outcome: StepOutcome,
}

/// How the deployment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployResult {
    Completed,
    Aborted {
        step: StepKind,
        exit_code: i32,
        reason: String,
    },
}

/// Summary of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    /// Stage trail starting at `Idle` and ending at `Done` or `Aborted`.
    pub stages: Vec<Stage>,
    pub result: DeployResult,
}

impl DeployOutcome {
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            DeployResult::Completed => exit_codes::OK,
            DeployResult::Aborted { exit_code, .. } => *exit_code,
        }
    }

    pub fn final_stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }
}

/// Run every step in order until the pipeline completes or a step is fatal.
///
/// Tolerated failures are recorded in the stage trail and the pipeline keeps
/// going. `Err` means the deployer itself failed (not a step).
pub fn run_deploy<R, C, F>(
    ctx: &DeployContext,
    runner: &R,
    console: &C,
    mut on_step: F,
) -> Result<DeployOutcome>
where
    R: CommandRunner,
    C: Console,
    F: FnMut(&StepReport),
{
    let mut stages = vec![Stage::Idle];
    for kind in StepKind::ALL {
        debug!(step = %kind, "running step");
        let outcome = run_step(kind, ctx, runner, console)?;
        let report = StepReport { kind, outcome };
        on_step(&report);

        let current = stages.last().copied().unwrap_or(Stage::Idle);
        match next(&report.outcome) {
            Next::Continue(stage) => {
                ensure_transition(current, stage)
                    .map_err(|err| anyhow!("step {kind} produced invalid stage: {err}"))?;
                stages.push(stage);
            }
            Next::Abort { exit_code, reason } => {
                error!(step = %kind, exit_code, %reason, "deployment aborted");
                stages.push(Stage::Aborted);
                return Ok(DeployOutcome {
                    stages,
                    result: DeployResult::Aborted {
                        step: kind,
                        exit_code,
                        reason,
                    },
                });
            }
        }
    }

    stages.push(Stage::Done);
    info!("deployment completed");
    console.status("✅ Deployment completed successfully!");
    Ok(DeployOutcome {
        stages,
        result: DeployResult::Completed,
    })
}

/// Commands a deployment would run, in order, given the current working copy.
///
/// The fetch step contributes a clone only when the working copy is absent;
/// the config write has no command.
pub fn planned_commands(ws: &Workspace) -> Result<Vec<(StepKind, CommandSpec)>> {
    let mut plan = Vec::new();
    if !ws.app_path().exists() {
        plan.push((StepKind::Fetch, ws.clone_command()));
    }
    plan.push((StepKind::Update, ws.pull_command()));
    plan.push((StepKind::InstallDeps, ws.install_command()?));
    plan.push((StepKind::Launch, ws.launch_command()?));
    Ok(plan)
}
