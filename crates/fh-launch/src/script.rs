//! Engine and queue script emission.
//!
//! Rendering is a pure function from the derived parameter set to the
//! engine's line-oriented `Keyword key value ...` grammar. Bracketed tokens
//! such as `[soft_macro_min]` and `[sim_index]` are placeholders the engine
//! resolves per clone at runtime; the orchestrator never substitutes them.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use fh_core::NodeId;

use crate::config::GceTrial;
use crate::derive::{NodeParameters, SimulationParameters};

/// Per-node artifact locations following the launch naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    /// Declarative script handed to the engine on a fresh start.
    pub script: PathBuf,
    /// Engine-owned checkpoint file used on resume.
    pub checkpoint: PathBuf,
    /// Per-node log-probability profile written by the engine.
    pub ln_prob: PathBuf,
    /// Per-node window bounds file written by the engine.
    pub bounds: PathBuf,
    /// Engine stdout capture.
    pub log: PathBuf,
    /// Queue submission script.
    pub queue: PathBuf,
}

impl NodePaths {
    /// Resolves the artifact locations for a node under the given directory.
    pub fn new(dir: &Path, prefix: &str, checkpoint_ext: &str, node: NodeId) -> Self {
        Self {
            script: dir.join(format!("{prefix}_launchn{node}.txt")),
            checkpoint: dir.join(format!("{prefix}_checkpointn{node}.{checkpoint_ext}")),
            ln_prob: dir.join(format!("{prefix}_lnpin{node}.txt")),
            bounds: dir.join(format!("{prefix}_boundsn{node}.txt")),
            log: dir.join(format!("{prefix}_launchn{node}.log")),
            queue: dir.join(format!("slurm{node}.txt")),
        }
    }
}

fn render_gce_trial(trial: &GceTrial) -> String {
    match trial {
        GceTrial::Transfer {
            weight,
            reference_index,
            num_steps,
        } => {
            let mut line = format!("TrialTransfer weight {weight} particle_type 0");
            if let Some(reference) = reference_index {
                let _ = write!(line, " reference_index {reference}");
            }
            if let Some(steps) = num_steps {
                let _ = write!(line, " num_steps {steps}");
            }
            line
        }
        GceTrial::GrowFile { file_name } => {
            format!("TrialGrowFile file_name {}", file_name.display())
        }
    }
}

/// Renders the declarative engine script for one node.
pub fn render_engine_script(
    params: &SimulationParameters,
    node: &NodeParameters,
    prefix: &str,
    paths: &NodePaths,
) -> String {
    let mut script = String::new();
    let id = node.node;

    // Clone coordinator: splices per-window collection matrices and owns the
    // node-level profile, bounds, and checkpoint files.
    let _ = writeln!(
        script,
        "CollectionMatrixSplice hours_per {} ln_prob_file {} bounds_file {} num_adjust_per_write 10 ln_prob_file_append true",
        params.hours_per_adjust,
        paths.ln_prob.display(),
        paths.bounds.display(),
    );
    let _ = writeln!(
        script,
        "WindowExponential maximum {} minimum {} num {} overlap {} alpha {} min_size {}",
        node.max_particles,
        node.min_particles,
        params.slots,
        params.window_overlap,
        node.window_alpha,
        params.window_min_size,
    );
    let _ = writeln!(
        script,
        "Checkpoint file_name {} num_hours {} num_hours_terminate {}",
        paths.checkpoint.display(),
        params.hours_per_checkpoint,
        params.hours_terminate,
    );
    script.push('\n');

    // Per-clone description.
    let _ = writeln!(script, "RandomMT19937 seed {}", node.seed);
    let _ = writeln!(
        script,
        "Configuration cubic_box_length {} particle_type0 {} physical_constants {}",
        params.cubic_box_length,
        params.forcefield.display(),
        params.physical_constants.engine_name(),
    );
    for potential in &params.potentials {
        let _ = writeln!(script, "{potential}");
    }
    if node.use_ref_potential {
        if let Some(cut) = params.dccb_cut {
            let _ = writeln!(
                script,
                "RefPotential Model {} cutoff {cut} VisitModel VisitModelCell min_length {cut}",
                params.ref_potential_model,
            );
        }
    }
    let _ = writeln!(
        script,
        "ThermoParams beta {} chemical_potential {}",
        params.beta, params.mu_init,
    );
    let _ = writeln!(script, "Metropolis");
    let _ = writeln!(
        script,
        "TrialTranslate weight 1 tunable_param 0.2 tunable_target_acceptance 0.25"
    );
    let _ = writeln!(
        script,
        "Log trials_per {} file_name {prefix}n{id}s[sim_index].txt",
        params.trials_per,
    );
    let _ = writeln!(script, "Tune");
    let _ = writeln!(
        script,
        "CheckEnergy trials_per {} tolerance 1e-4",
        params.trials_per,
    );
    script.push('\n');

    // Grand-canonical initialization and canonical equilibration.
    let _ = writeln!(script, "TrialAdd particle_type 0");
    let _ = writeln!(script, "Run until_num_particles [soft_macro_min]");
    let _ = writeln!(script, "RemoveTrial name TrialAdd");
    let _ = writeln!(
        script,
        "ThermoParams beta {} chemical_potential {}",
        params.beta, params.mu,
    );
    let _ = writeln!(script, "Metropolis");
    let _ = writeln!(script, "Run num_trials {}", params.equilibration);
    let _ = writeln!(script, "RemoveModify name Tune");
    script.push('\n');

    // Flat-histogram production.
    let _ = writeln!(
        script,
        "FlatHistogram Macrostate MacrostateNumParticles width 1 max {} min {} \
soft_macro_max [soft_macro_max] soft_macro_min [soft_macro_min] \
Bias WLTM min_sweeps {} new_sweep 1 min_flatness 25 collect_flatness 20 min_collect_sweeps 20",
        node.max_particles, node.min_particles, node.min_sweeps,
    );
    let _ = writeln!(script, "{}", render_gce_trial(&node.gce_trial));
    let _ = writeln!(script, "RemoveAnalyze name Log");
    let _ = writeln!(
        script,
        "Log trials_per {} file_name {prefix}n{id}s[sim_index].txt",
        params.trials_per,
    );
    let _ = writeln!(
        script,
        "Movie trials_per {} file_name {prefix}n{id}s[sim_index].xyz",
        params.trials_per,
    );
    let _ = writeln!(
        script,
        "Tune trials_per_write {} file_name {prefix}_tunen{id}s[sim_index].txt multistate true stop_after_iteration 20",
        params.trials_per,
    );
    let _ = writeln!(
        script,
        "Energy trials_per_write {} file_name {prefix}_enn{id}s[sim_index].txt multistate true start_after_iteration 20",
        params.trials_per,
    );
    let _ = writeln!(script, "CriteriaUpdater trials_per 1e5");
    let _ = writeln!(
        script,
        "CriteriaWriter trials_per {} file_name {prefix}_critn{id}s[sim_index].txt",
        params.trials_per,
    );
    script
}

/// Renders the queue batch script for one node's restartable array job.
///
/// The script re-invokes the launcher with the queue-supplied array task
/// index, so task 0 starts fresh and later tasks resume from the node's
/// checkpoint. A fully successful invocation cancels the remaining sibling
/// array tasks; a checkpoint-and-exit leaves them to restart the node.
pub fn render_queue_script(
    params: &SimulationParameters,
    node: NodeId,
    launcher: &Path,
    config_path: &Path,
) -> String {
    format!(
        "#!/bin/bash\n\
#SBATCH -n {slots} -N 1 -t {minutes}:00 -o hostname_%j.out -e hostname_%j.out\n\
echo \"Running {config} ID $SLURM_JOB_ID on $(hostname) at $(date) in $PWD\"\n\
cd $PWD\n\
export OMP_NUM_THREADS={slots}\n\
{launcher} --config {config} --run_type 1 --task $SLURM_ARRAY_TASK_ID --node {node} --dir $PWD\n\
if [ $? == 0 ]; then\n\
  echo \"Job is done\"\n\
  scancel $SLURM_ARRAY_JOB_ID\n\
else\n\
  echo \"Job is terminating, to be restarted again\"\n\
fi\n\
echo \"Time is $(date)\"\n",
        slots = params.slots,
        minutes = params.num_minutes,
        config = config_path.display(),
        launcher = launcher.display(),
        node = node,
    )
}
