use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;
use fh_core::NodeId;
use fh_launch::config::RunConfig;
use fh_launch::derive::{derive_parameters, SimulationParameters};
use fh_launch::engine::ProcessEngine;
use fh_launch::hash::stable_hash_string;
use fh_launch::lifecycle::{LifecycleController, UnitOutcome};
use fh_launch::manifest::RunManifest;
use fh_launch::script::render_queue_script;
use fh_splice::profile::ProbabilityProfile;
use fh_splice::report::SpliceReport;
use fh_splice::splice::splice_profiles;
use fh_splice::validate::{validate_profile, ReferenceProfile};

#[derive(Parser, Debug)]
#[command(name = "fh", about = "Flat-histogram launch orchestrator")]
struct Cli {
    /// YAML run configuration.
    #[arg(long)]
    config: PathBuf,
    /// 0: submit batch to scheduler, 1: run batch on host.
    #[arg(long = "run_type", default_value_t = 0)]
    run_type: u8,
    /// Queue-supplied array task index. If >0, restart from checkpoint.
    #[arg(long, default_value_t = 0)]
    task: u32,
    /// Node partition handled by this invocation.
    #[arg(long, default_value_t = 0)]
    node: u32,
    /// Original working directory that the run was launched from.
    #[arg(long)]
    dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = RunConfig::load(&cli.config)?;
    let params = derive_parameters(&config)?;
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    match cli.run_type {
        0 => run_submit(&cli, &config, &params, &dir),
        1 => run_execute(&cli, &config, &params, &dir),
        other => Err(format!("unrecognized run_type {other}").into()),
    }
}

/// Emits the manifest and per-node queue scripts, then submits one
/// restartable array job per node.
fn run_submit(
    cli: &Cli,
    config: &RunConfig,
    params: &SimulationParameters,
    dir: &Path,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    let manifest = RunManifest::build(config, params, dir)?;
    manifest.write(&dir.join(&config.output.manifest_file))?;

    let launcher = std::env::current_exe()?;
    for node_params in &params.nodes {
        let node = node_params.node;
        let script = render_queue_script(params, node, &launcher, &cli.config);
        let script_path = dir.join(format!("slurm{node}.txt"));
        fs::write(&script_path, script)?;
        let job_id = submit_node(&config.queue.submit_command, config.queue.max_restarts, &script_path)?;
        append_launch_id(&dir.join("launch_ids.txt"), &job_id)?;
    }
    Ok(())
}

/// Submits one node's array job and returns the queue-assigned job id.
fn submit_node(
    submit_command: &str,
    max_restarts: u32,
    script: &Path,
) -> Result<String, Box<dyn Error>> {
    let output = Command::new(submit_command)
        .arg(format!("--array=0-{max_restarts}%1"))
        .arg(script)
        .output()?;
    if !output.status.success() {
        return Err(format!(
            "{submit_command} failed with status {}",
            output.status.code().unwrap_or(-1)
        )
        .into());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let job_id = stdout
        .split_whitespace()
        .last()
        .ok_or("queue submission printed no job id")?;
    Ok(job_id.to_string())
}

fn append_launch_id(path: &Path, job_id: &str) -> Result<(), Box<dyn Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{job_id}")?;
    Ok(())
}

/// Executes one (node, task) unit and, when the ledger shows every node
/// complete, the splice and validation post-stage.
fn run_execute(
    cli: &Cli,
    config: &RunConfig,
    params: &SimulationParameters,
    dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let engine = ProcessEngine::new(
        config.engine.fresh_command.clone(),
        config.engine.resume_command.clone(),
    );
    let controller = LifecycleController::new(params, &engine, &config.output, dir)?;
    let report = controller.run_unit(NodeId::from_raw(cli.node), cli.task)?;

    match report.outcome {
        UnitOutcome::Failed(code) => {
            Err(format!("node {} task {} failed with engine status {code}", cli.node, cli.task).into())
        }
        UnitOutcome::CheckpointReached => {
            // Non-zero tells the queue to resubmit the next task index.
            Err(format!("node {} checkpointed; awaiting restart", cli.node).into())
        }
        UnitOutcome::Completed => {
            if report.post_stage_ready {
                run_post_stage(config, dir, &controller.profiles_in_order()?)
            } else {
                Ok(())
            }
        }
    }
}

/// Splices every node's profile, writes the merged profile and report, and
/// validates against the reference dataset when one is configured.
fn run_post_stage(
    config: &RunConfig,
    dir: &Path,
    profile_paths: &[PathBuf],
) -> Result<(), Box<dyn Error>> {
    let mut profiles = Vec::with_capacity(profile_paths.len());
    for path in profile_paths {
        profiles.push(ProbabilityProfile::read_csv(path)?);
    }
    let outcome = splice_profiles(&profiles)?;

    let merged_file = dir.join(format!("{}_lnpi.csv", config.output.prefix));
    outcome.profile.write_csv(&merged_file)?;

    let validation = match &config.output.reference_file {
        Some(reference) => {
            let reference_path = if reference.is_absolute() {
                reference.clone()
            } else {
                dir.join(reference)
            };
            let reference = ReferenceProfile::read_csv(&reference_path)?;
            Some(validate_profile(&outcome.profile, &reference))
        }
        None => None,
    };

    let report = SpliceReport::new(
        &outcome,
        &merged_file,
        validation.clone(),
        stable_hash_string(config)?,
        config.seed_policy.master_seed,
    );
    report.write(&dir.join(&config.output.report_file))?;

    if let Some(validation) = validation {
        if !validation.passed {
            return Err(format!(
                "merged profile diverged from the reference at {} states; see {}",
                validation.divergences.len(),
                config.output.report_file.display()
            )
            .into());
        }
    }
    Ok(())
}
