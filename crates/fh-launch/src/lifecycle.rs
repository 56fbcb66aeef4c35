//! Job lifecycle state machine.
//!
//! One (node, task) unit per invocation, driven by the queue-supplied task
//! index: task 0 emits the node's script and starts the engine fresh, any
//! later task resumes from the node's checkpoint without re-emitting. The
//! controller blocks only on process exit; it cannot observe simulation
//! progress. Restart-on-failure is owned by the queuing system's
//! resubmission policy, never retried in-process.

use std::fs;
use std::path::{Path, PathBuf};

use fh_core::errors::{ErrorInfo, FhError};
use fh_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::config::OutputConfig;
use crate::derive::SimulationParameters;
use crate::engine::{Engine, EngineStatus};
use crate::ledger::CompletionLedger;
use crate::script::{render_engine_script, NodePaths};
use crate::window::partition_windows;

/// Terminal state of one (node, task) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitOutcome {
    /// Engine exited zero and the node's final profile exists.
    Completed,
    /// Engine exited zero after a time-budget checkpoint stop; the queue is
    /// expected to resubmit the next task index.
    CheckpointReached,
    /// Engine exited non-zero; the exit code is propagated to the queue.
    Failed(i32),
}

/// Report describing one lifecycle invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Node partition handled by this invocation.
    pub node: NodeId,
    /// Queue-supplied task index.
    pub task: u32,
    /// Whether the invocation started fresh (task 0) or resumed.
    pub fresh: bool,
    /// Terminal state of the unit.
    pub outcome: UnitOutcome,
    /// Whether the ledger now shows every node complete, so the splice
    /// post-stage may run.
    pub post_stage_ready: bool,
}

/// Drives fresh/resume engine invocations and records node completion.
pub struct LifecycleController<'a, E: Engine> {
    params: &'a SimulationParameters,
    engine: &'a E,
    ledger: CompletionLedger,
    dir: PathBuf,
    prefix: String,
    checkpoint_extension: String,
}

impl<'a, E: Engine> LifecycleController<'a, E> {
    /// Creates a controller writing artifacts under `dir`.
    pub fn new(
        params: &'a SimulationParameters,
        engine: &'a E,
        output: &OutputConfig,
        dir: &Path,
    ) -> Result<Self, FhError> {
        let ledger = CompletionLedger::open(&dir.join(&output.ledger_dir), params.nodes.len())?;
        Ok(Self {
            params,
            engine,
            ledger,
            dir: dir.to_path_buf(),
            prefix: output.prefix.clone(),
            checkpoint_extension: output.checkpoint_extension.clone(),
        })
    }

    /// Resolves the artifact locations for a node.
    pub fn node_paths(&self, node: NodeId) -> NodePaths {
        NodePaths::new(&self.dir, &self.prefix, &self.checkpoint_extension, node)
    }

    /// Read access to the completion ledger.
    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// Executes one (node, task) unit and records its terminal state.
    pub fn run_unit(&self, node: NodeId, task: u32) -> Result<UnitReport, FhError> {
        let node_params = self.params.node(node)?;
        // An impossible window layout must abort before any process launch.
        partition_windows(&self.params.window_spec(node_params))?;

        let paths = self.node_paths(node);
        let fresh = task == 0;
        let status = if fresh {
            let script = render_engine_script(self.params, node_params, &self.prefix, &paths);
            fs::write(&paths.script, script).map_err(|err| {
                FhError::Engine(
                    ErrorInfo::new("script-write", err.to_string())
                        .with_context("path", paths.script.display().to_string()),
                )
            })?;
            self.engine.fresh(&paths.script, &paths.log)?
        } else {
            self.engine.resume(&paths.checkpoint, &paths.log)?
        };

        let (outcome, post_stage_ready) = match status {
            EngineStatus::Failure(code) => {
                self.ledger
                    .mark_failed(node, task, &format!("engine exited with status {code}"))?;
                (UnitOutcome::Failed(code), false)
            }
            EngineStatus::Success => {
                if paths.ln_prob.exists() {
                    self.ledger.mark_complete(node, task, &paths.ln_prob)?;
                    (UnitOutcome::Completed, self.ledger.all_complete()?)
                } else {
                    // Zero exit without a final profile: the engine stopped
                    // on its time budget with state preserved. The ledger
                    // entry stays pending so the queue's next task resumes.
                    (UnitOutcome::CheckpointReached, false)
                }
            }
        };

        Ok(UnitReport {
            node,
            task,
            fresh,
            outcome,
            post_stage_ready,
        })
    }

    /// Returns every node's final profile path, in ascending node order,
    /// once the ledger shows the run complete.
    pub fn profiles_in_order(&self) -> Result<Vec<PathBuf>, FhError> {
        self.ledger.profiles_in_order()
    }
}
