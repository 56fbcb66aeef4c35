#![deny(missing_docs)]
//! Derivation, partitioning, and lifecycle control for multi-node
//! flat-histogram launches driven by an external Monte Carlo engine.

/// YAML configuration schema and defaults.
pub mod config;
/// Derivation of secondary simulation parameters.
pub mod derive;
/// Engine invocation capability and process-backed implementation.
pub mod engine;
/// Canonical hashing helpers.
pub mod hash;
/// Per-node completion ledger gating the splice post-stage.
pub mod ledger;
/// Job lifecycle state machine (fresh, resume, exit interpretation).
pub mod lifecycle;
/// Run manifest serialization helpers.
pub mod manifest;
/// Engine and queue script emission.
pub mod script;
/// Canonical JSON/YAML serialization helpers.
pub mod serde_io;
/// Macrostate window partitioning.
pub mod window;

pub use config::{GceTrial, NodeConfig, QueueConfig, RunConfig, SeedPolicy, TimeBudget};
pub use derive::{derive_parameters, snap_cutoff, NodeParameters, SimulationParameters};
pub use engine::{Engine, EngineStatus, ProcessEngine};
pub use ledger::{CompletionLedger, NodeEntry, NodeState};
pub use lifecycle::{LifecycleController, UnitOutcome, UnitReport};
pub use manifest::{NodeManifest, RunManifest};
pub use script::{render_engine_script, render_queue_script, NodePaths};
pub use window::{partition_windows, validate_windows, Window, WindowSpec};
