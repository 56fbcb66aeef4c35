use std::path::Path;

use fh_core::NodeId;
use fh_launch::config::RunConfig;
use fh_launch::derive::derive_parameters;
use fh_launch::script::{render_engine_script, render_queue_script, NodePaths};

fn spce_like_yaml() -> &'static str {
    r#"
system:
  cubic_box_length: 20.0
  forcefield: forcefield/spce.txt
  min_particles: 0
  max_particles: 296
  temperature: 300.0
  beta_mu: -15.24
  physical_constants: Codata2010
  dccb_cut: 2.8485
  ref_potential_model: HardSphere
queue:
  procs_per_node: 32
output:
  prefix: spce
splice_points: [180]
nodes:
  - min_sweeps: 20000
    window_alpha: 1.1
  - use_ref_potential: true
    window_alpha: 2.5
    gce_trial:
      type: grow-file
      file_name: spce_grow.txt
"#
}

fn load(yaml: &str) -> RunConfig {
    serde_yaml::from_str(yaml).expect("parse config")
}

#[test]
fn engine_script_contains_the_node_contract() {
    let config = load(spce_like_yaml());
    let params = derive_parameters(&config).expect("derive");
    let node = &params.nodes[0];
    let paths = NodePaths::new(Path::new("/runs/spce"), "spce", "fst", node.node);
    let script = render_engine_script(&params, node, "spce", &paths);

    assert!(script.contains("ln_prob_file /runs/spce/spce_lnpin0.txt"));
    assert!(script.contains("bounds_file /runs/spce/spce_boundsn0.txt"));
    assert!(script.contains("Checkpoint file_name /runs/spce/spce_checkpointn0.fst"));
    assert!(script.contains("WindowExponential maximum 180 minimum 0 num 32"));
    assert!(script.contains("alpha 1.1"));
    assert!(script.contains("min_sweeps 20000"));
    assert!(script.contains("physical_constants CODATA2010"));
    assert!(script.contains(&format!("RandomMT19937 seed {}", node.seed)));
    // Node 0 does not enable the reference potential.
    assert!(!script.contains("RefPotential"));
}

#[test]
fn bracketed_tokens_are_left_for_the_engine() {
    let config = load(spce_like_yaml());
    let params = derive_parameters(&config).expect("derive");
    let node = &params.nodes[0];
    let paths = NodePaths::new(Path::new("."), "spce", "fst", node.node);
    let script = render_engine_script(&params, node, "spce", &paths);

    assert!(script.contains("until_num_particles [soft_macro_min]"));
    assert!(script.contains("soft_macro_max [soft_macro_max]"));
    assert!(script.contains("s[sim_index].txt"));
}

#[test]
fn ref_potential_and_grow_file_render_on_the_biased_node() {
    let config = load(spce_like_yaml());
    let params = derive_parameters(&config).expect("derive");
    let node = &params.nodes[1];
    let paths = NodePaths::new(Path::new("."), "spce", "fst", node.node);
    let script = render_engine_script(&params, node, "spce", &paths);

    let cut = params.dccb_cut.expect("cutoff");
    assert!(script.contains(&format!(
        "RefPotential Model HardSphere cutoff {cut} VisitModel VisitModelCell min_length {cut}"
    )));
    assert!(script.contains("TrialGrowFile file_name spce_grow.txt"));
    assert!(script.contains("WindowExponential maximum 296 minimum 180"));
}

#[test]
fn queue_script_restarts_until_done_then_cancels_siblings() {
    let config = load(spce_like_yaml());
    let params = derive_parameters(&config).expect("derive");
    let script = render_queue_script(
        &params,
        NodeId::from_raw(1),
        Path::new("/usr/bin/fh"),
        Path::new("spce.yaml"),
    );

    assert!(script.contains("#SBATCH -n 32 -N 1 -t 7200:00"));
    assert!(script.contains(
        "/usr/bin/fh --config spce.yaml --run_type 1 --task $SLURM_ARRAY_TASK_ID --node 1"
    ));
    assert!(script.contains("scancel $SLURM_ARRAY_JOB_ID"));
    assert!(script.contains("to be restarted again"));
}
