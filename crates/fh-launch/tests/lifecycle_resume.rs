use std::cell::Cell;
use std::fs;
use std::path::Path;

use fh_core::{FhError, NodeId};
use fh_launch::config::RunConfig;
use fh_launch::derive::derive_parameters;
use fh_launch::engine::{Engine, EngineStatus};
use fh_launch::lifecycle::{LifecycleController, UnitOutcome};

fn one_node_yaml() -> &'static str {
    r#"
system:
  cubic_box_length: 8.0
  forcefield: forcefield/lj.txt
  min_particles: 0
  max_particles: 20
  beta: 1.4285714285714286
  mu: -4.1603632
queue:
  procs_per_node: 4
nodes:
  - {}
"#
}

fn two_node_yaml() -> &'static str {
    r#"
system:
  cubic_box_length: 8.0
  forcefield: forcefield/lj.txt
  min_particles: 0
  max_particles: 20
  beta: 1.4285714285714286
  mu: -4.1603632
queue:
  procs_per_node: 4
splice_points: [10]
nodes:
  - {}
  - {}
"#
}

fn load(yaml: &str) -> RunConfig {
    serde_yaml::from_str(yaml).expect("parse config")
}

/// Extracts the value following `key` on the first line starting with
/// `statement`, mirroring how the engine reads its declarative input.
fn script_value(script: &str, statement: &str, key: &str) -> String {
    let line = script
        .lines()
        .find(|line| line.starts_with(statement))
        .unwrap_or_else(|| panic!("script has no {statement} statement"));
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == key {
            return tokens.next().expect("key has a value").to_string();
        }
    }
    panic!("{statement} statement has no {key} key");
}

/// Deterministic engine double.
///
/// A fresh start parses the script for its file contract exactly as the real
/// engine would; each invocation consumes one "run" and the profile appears
/// once `runs_needed` invocations have happened, with intermediate state
/// carried in the checkpoint file.
struct StubEngine {
    runs_needed: u32,
    fresh_calls: Cell<u32>,
    resume_calls: Cell<u32>,
}

impl StubEngine {
    fn new(runs_needed: u32) -> Self {
        Self {
            runs_needed,
            fresh_calls: Cell::new(0),
            resume_calls: Cell::new(0),
        }
    }

    fn write_profile(path: &Path, min: i64, max: i64) {
        let mut out = String::from("state,ln_prob\n");
        for state in min..=max {
            out.push_str(&format!("{state},{}\n", -0.1 * state as f64 - 1.0));
        }
        fs::write(path, out).expect("write profile");
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StubCheckpoint {
    ln_prob_file: String,
    min: i64,
    max: i64,
    runs_left: u32,
}

impl Engine for StubEngine {
    fn fresh(&self, script: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        self.fresh_calls.set(self.fresh_calls.get() + 1);
        let text = fs::read_to_string(script).expect("read script");
        let ln_prob_file = script_value(&text, "CollectionMatrixSplice", "ln_prob_file");
        let checkpoint = script_value(&text, "Checkpoint", "file_name");
        let min: i64 = script_value(&text, "WindowExponential", "minimum")
            .parse()
            .expect("minimum");
        let max: i64 = script_value(&text, "WindowExponential", "maximum")
            .parse()
            .expect("maximum");
        fs::write(log, "stub engine fresh start\n").expect("write log");

        let runs_left = self.runs_needed.saturating_sub(1);
        let state = StubCheckpoint {
            ln_prob_file: ln_prob_file.clone(),
            min,
            max,
            runs_left,
        };
        fs::write(
            &checkpoint,
            serde_json::to_string(&state).expect("serialize stub checkpoint"),
        )
        .expect("write checkpoint");
        if runs_left == 0 {
            Self::write_profile(Path::new(&ln_prob_file), min, max);
        }
        Ok(EngineStatus::Success)
    }

    fn resume(&self, checkpoint: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        self.resume_calls.set(self.resume_calls.get() + 1);
        let mut state: StubCheckpoint =
            serde_json::from_str(&fs::read_to_string(checkpoint).expect("read checkpoint"))
                .expect("parse stub checkpoint");
        fs::write(log, "stub engine resume\n").expect("write log");
        state.runs_left = state.runs_left.saturating_sub(1);
        fs::write(
            checkpoint,
            serde_json::to_string(&state).expect("serialize stub checkpoint"),
        )
        .expect("write checkpoint");
        if state.runs_left == 0 {
            Self::write_profile(Path::new(&state.ln_prob_file), state.min, state.max);
        }
        Ok(EngineStatus::Success)
    }
}

/// Engine double that always fails.
struct FailingEngine;

impl Engine for FailingEngine {
    fn fresh(&self, _script: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        fs::write(log, "stub engine failure\n").expect("write log");
        Ok(EngineStatus::Failure(137))
    }

    fn resume(&self, _checkpoint: &Path, log: &Path) -> Result<EngineStatus, FhError> {
        fs::write(log, "stub engine failure\n").expect("write log");
        Ok(EngineStatus::Failure(137))
    }
}

#[test]
fn interrupted_run_reaches_the_same_completed_state() {
    let config = load(one_node_yaml());
    let params = derive_parameters(&config).expect("derive");
    let node = NodeId::from_raw(0);

    // Uninterrupted: one invocation completes the node.
    let straight_dir = tempfile::tempdir().expect("tmp dir");
    let straight_engine = StubEngine::new(1);
    let controller =
        LifecycleController::new(&params, &straight_engine, &config.output, straight_dir.path())
            .expect("controller");
    let report = controller.run_unit(node, 0).expect("run");
    assert_eq!(report.outcome, UnitOutcome::Completed);
    assert!(report.post_stage_ready);
    let straight_profile =
        fs::read_to_string(controller.node_paths(node).ln_prob).expect("profile");

    // Interrupted: task 0 checkpoints, task 1 resumes to completion.
    let resumed_dir = tempfile::tempdir().expect("tmp dir");
    let resumed_engine = StubEngine::new(2);
    let controller =
        LifecycleController::new(&params, &resumed_engine, &config.output, resumed_dir.path())
            .expect("controller");
    let first = controller.run_unit(node, 0).expect("run");
    assert_eq!(first.outcome, UnitOutcome::CheckpointReached);
    assert!(!first.post_stage_ready);
    assert!(!controller.ledger().all_complete().expect("query"));

    let second = controller.run_unit(node, 1).expect("run");
    assert_eq!(second.outcome, UnitOutcome::Completed);
    assert!(second.post_stage_ready);
    assert!(!second.fresh);
    // The script is emitted exactly once; resume never re-emits.
    assert_eq!(resumed_engine.fresh_calls.get(), 1);
    assert_eq!(resumed_engine.resume_calls.get(), 1);

    let resumed_profile =
        fs::read_to_string(controller.node_paths(node).ln_prob).expect("profile");
    assert_eq!(straight_profile, resumed_profile);
}

#[test]
fn post_stage_waits_for_every_node() {
    let config = load(two_node_yaml());
    let params = derive_parameters(&config).expect("derive");
    let dir = tempfile::tempdir().expect("tmp dir");
    let engine = StubEngine::new(1);
    let controller =
        LifecycleController::new(&params, &engine, &config.output, dir.path()).expect("controller");

    let first = controller.run_unit(NodeId::from_raw(0), 0).expect("run");
    assert_eq!(first.outcome, UnitOutcome::Completed);
    assert!(!first.post_stage_ready);
    assert!(controller.profiles_in_order().is_err());

    let second = controller.run_unit(NodeId::from_raw(1), 0).expect("run");
    assert_eq!(second.outcome, UnitOutcome::Completed);
    assert!(second.post_stage_ready);
    let profiles = controller.profiles_in_order().expect("profiles");
    assert_eq!(profiles.len(), 2);
}

#[test]
fn engine_failure_is_recorded_and_not_retried() {
    let config = load(one_node_yaml());
    let params = derive_parameters(&config).expect("derive");
    let dir = tempfile::tempdir().expect("tmp dir");
    let engine = FailingEngine;
    let controller =
        LifecycleController::new(&params, &engine, &config.output, dir.path()).expect("controller");

    let report = controller.run_unit(NodeId::from_raw(0), 0).expect("run");
    assert_eq!(report.outcome, UnitOutcome::Failed(137));
    assert!(!report.post_stage_ready);
    assert!(!controller.ledger().all_complete().expect("query"));
}
