use std::fs;
use std::path::{Path, PathBuf};

use fh_core::errors::{ErrorInfo, FhError};
use fh_core::ConstantsTable;
use serde::{Deserialize, Serialize};

use crate::serde_io::from_yaml_slice;

/// YAML-configurable primitives governing a launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulation cell, thermodynamic state, and particle bounds.
    pub system: SystemConfig,
    /// Trial scheduling defaults shared by all nodes.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Wall-clock budgets shared by all compute slots of a node.
    #[serde(default)]
    pub time: TimeBudget,
    /// Queuing system settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Engine binaries and invocation settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Artifact naming and reference dataset location.
    #[serde(default)]
    pub output: OutputConfig,
    /// Macrostate values at which the global range is cut between nodes.
    /// Must contain exactly `nodes.len() - 1` ascending entries.
    #[serde(default)]
    pub splice_points: Vec<i64>,
    /// Per-node overrides. At least one node is required.
    pub nodes: Vec<NodeConfig>,
}

/// Simulation cell and thermodynamic state primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Edge length of the cubic simulation cell.
    pub cubic_box_length: f64,
    /// Path to the particle forcefield file consumed by the engine.
    pub forcefield: PathBuf,
    /// Smallest particle count of the global macrostate range.
    #[serde(default)]
    pub min_particles: i64,
    /// Largest particle count of the global macrostate range.
    pub max_particles: i64,
    /// Temperature in Kelvin; converted to `beta` via the constants table.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Inverse temperature supplied directly, bypassing the constants table.
    #[serde(default)]
    pub beta: Option<f64>,
    /// Chemical potential scaled by `beta`; divided out during derivation.
    #[serde(default)]
    pub beta_mu: Option<f64>,
    /// Chemical potential supplied directly.
    #[serde(default)]
    pub mu: Option<f64>,
    /// Chemical potential used for grand-canonical initialization.
    #[serde(default = "default_mu_init")]
    pub mu_init: f64,
    /// Physical constants table shared with the engine.
    #[serde(default)]
    pub physical_constants: ConstantsTable,
    /// Requested distance-bias cutoff, snapped to divide the box evenly.
    #[serde(default)]
    pub dccb_cut: Option<f64>,
    /// Model used by the short-ranged reference potential on nodes that
    /// enable it.
    #[serde(default = "default_ref_potential_model")]
    pub ref_potential_model: String,
    /// Potential statements forwarded verbatim to the engine script.
    #[serde(default = "default_potentials")]
    pub potentials: Vec<String>,
}

fn default_ref_potential_model() -> String {
    "LennardJones".to_string()
}

fn default_mu_init() -> f64 {
    10.0
}

fn default_potentials() -> Vec<String> {
    vec![
        "Potential Model LennardJones".to_string(),
        "Potential VisitModel LongRangeCorrections".to_string(),
    ]
}

/// Trial scheduling defaults applied when a node does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Trials between analysis writes.
    #[serde(default = "default_trials_per")]
    pub trials_per: f64,
    /// Canonical-ensemble equilibration trials before production.
    #[serde(default = "default_equilibration")]
    pub equilibration: f64,
    /// Default bias sweep requirement before a node is considered complete.
    #[serde(default = "default_min_sweeps")]
    pub min_sweeps: u64,
    /// Default window-spacing exponent.
    #[serde(default = "default_window_alpha")]
    pub window_alpha: f64,
    /// Minimum number of macrostates per window.
    #[serde(default = "default_window_min_size")]
    pub window_min_size: i64,
    /// Number of shared macrostates between adjacent windows.
    #[serde(default)]
    pub window_overlap: i64,
}

fn default_trials_per() -> f64 {
    1e6
}

fn default_equilibration() -> f64 {
    1e6
}

fn default_min_sweeps() -> u64 {
    200
}

fn default_window_alpha() -> f64 {
    2.5
}

fn default_window_min_size() -> i64 {
    2
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            trials_per: default_trials_per(),
            equilibration: default_equilibration(),
            min_sweeps: default_min_sweeps(),
            window_alpha: default_window_alpha(),
            window_min_size: default_window_min_size(),
            window_overlap: 0,
        }
    }
}

/// Wall-clock budgets. The queuing system's time limit is shared across all
/// slots of a node, so per-slot budgets are scaled by the slot count during
/// derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBudget {
    /// Total wall-clock hours requested from the queue.
    #[serde(default = "default_num_hours")]
    pub num_hours: f64,
    /// Hours between checkpoint writes, per slot before scaling.
    #[serde(default = "default_hours_per_checkpoint")]
    pub hours_per_checkpoint: f64,
    /// Hours between bias adjustment writes, per slot before scaling.
    #[serde(default = "default_hours_per_adjust")]
    pub hours_per_adjust: f64,
}

fn default_num_hours() -> f64 {
    5.0 * 24.0
}

fn default_hours_per_checkpoint() -> f64 {
    1.0
}

fn default_hours_per_adjust() -> f64 {
    0.01
}

impl Default for TimeBudget {
    fn default() -> Self {
        Self {
            num_hours: default_num_hours(),
            hours_per_checkpoint: default_hours_per_checkpoint(),
            hours_per_adjust: default_hours_per_adjust(),
        }
    }
}

/// Queuing system settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Parallel compute slots per node; also the window count.
    #[serde(default = "default_procs_per_node")]
    pub procs_per_node: usize,
    /// Highest array task index; tasks above zero resume from checkpoints.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Submission command for the queue batch script.
    #[serde(default = "default_submit_command")]
    pub submit_command: String,
}

fn default_procs_per_node() -> usize {
    32
}

fn default_max_restarts() -> u32 {
    2
}

fn default_submit_command() -> String {
    "sbatch".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            procs_per_node: default_procs_per_node(),
            max_restarts: default_max_restarts(),
            submit_command: default_submit_command(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed from which per-node engine seeds are derived.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests alongside the seed.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Engine binary locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Binary reading a declarative script on standard input.
    #[serde(default = "default_fresh_command")]
    pub fresh_command: PathBuf,
    /// Binary accepting a checkpoint file path as its sole argument.
    #[serde(default = "default_resume_command")]
    pub resume_command: PathBuf,
}

fn default_fresh_command() -> PathBuf {
    PathBuf::from("fst")
}

fn default_resume_command() -> PathBuf {
    PathBuf::from("rst")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fresh_command: default_fresh_command(),
            resume_command: default_resume_command(),
        }
    }
}

/// Artifact naming and reference dataset location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Prefix shared by all per-node artifact files.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Extension of the engine-owned checkpoint files.
    #[serde(default = "default_checkpoint_extension")]
    pub checkpoint_extension: String,
    /// Reference profile used by the validator, relative to the launch dir.
    #[serde(default)]
    pub reference_file: Option<PathBuf>,
    /// Directory holding per-node completion ledger entries.
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: PathBuf,
    /// Manifest filename.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,
    /// Splice report filename.
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
}

fn default_prefix() -> String {
    "fh".to_string()
}

fn default_checkpoint_extension() -> String {
    "fst".to_string()
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("ledger")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_report_file() -> PathBuf {
    PathBuf::from("splice_report.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            checkpoint_extension: default_checkpoint_extension(),
            reference_file: None,
            ledger_dir: default_ledger_dir(),
            manifest_file: default_manifest_file(),
            report_file: default_report_file(),
        }
    }
}

/// Grand-canonical trial flavor used during production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GceTrial {
    /// Single-stage particle transfer trial.
    Transfer {
        /// Relative trial weight.
        #[serde(default = "default_transfer_weight")]
        weight: f64,
        /// Optional reference potential index for staged insertions.
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_index: Option<i64>,
        /// Optional number of configurational-bias stages.
        #[serde(skip_serializing_if = "Option::is_none")]
        num_steps: Option<u64>,
    },
    /// Multi-stage growth described by an engine-side file.
    GrowFile {
        /// Path to the growth description file.
        file_name: PathBuf,
    },
}

fn default_transfer_weight() -> f64 {
    2.0
}

impl Default for GceTrial {
    fn default() -> Self {
        GceTrial::Transfer {
            weight: default_transfer_weight(),
            reference_index: None,
            num_steps: None,
        }
    }
}

/// Per-node overrides of the sampling defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Bias sweep requirement override.
    #[serde(default)]
    pub min_sweeps: Option<u64>,
    /// Window-spacing exponent override.
    #[serde(default)]
    pub window_alpha: Option<f64>,
    /// Enables the distance-biased reference potential for this node.
    #[serde(default)]
    pub use_ref_potential: bool,
    /// Grand-canonical trial flavor override.
    #[serde(default)]
    pub gce_trial: Option<GceTrial>,
}

impl RunConfig {
    /// Loads a run configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, FhError> {
        let bytes = fs::read(path).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_yaml_slice(&bytes)
    }

    /// Number of node partitions configured for the run.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}
