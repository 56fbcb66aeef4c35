//! Derivation of secondary simulation parameters from user primitives.
//!
//! All values consumed by the script emitter and the window partitioner are
//! computed here, once, into an immutable [`SimulationParameters`] value. No
//! downstream component mutates a shared parameter set.

use std::path::PathBuf;

use fh_core::errors::{ErrorInfo, FhError};
use fh_core::{derive_node_seed, ConstantsTable, NodeId};
use serde::{Deserialize, Serialize};

use crate::config::{GceTrial, RunConfig};
use crate::window::WindowSpec;

/// Fraction of the scaled wall-clock budget after which the engine
/// checkpoints and exits rather than risking a hard queue kill.
const TERMINATE_FRACTION: f64 = 0.95;

/// Immutable per-node parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameters {
    /// Node partition index.
    pub node: NodeId,
    /// Smallest particle count of this node's macrostate sub-range.
    pub min_particles: i64,
    /// Largest particle count of this node's macrostate sub-range.
    pub max_particles: i64,
    /// Engine seed derived from the master seed and the node index.
    pub seed: u64,
    /// Bias sweep requirement before the node is considered complete.
    pub min_sweeps: u64,
    /// Window-spacing exponent for this node.
    pub window_alpha: f64,
    /// Whether the distance-biased reference potential is enabled.
    pub use_ref_potential: bool,
    /// Grand-canonical trial flavor for production.
    pub gce_trial: GceTrial,
}

/// Immutable derived parameter set for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Inverse temperature in mol/kJ.
    pub beta: f64,
    /// Chemical potential in kJ/mol.
    pub mu: f64,
    /// Chemical potential used during grand-canonical initialization.
    pub mu_init: f64,
    /// Edge length of the cubic simulation cell.
    pub cubic_box_length: f64,
    /// Forcefield file forwarded to the engine.
    pub forcefield: PathBuf,
    /// Constants table shared with the engine.
    pub physical_constants: ConstantsTable,
    /// Distance-bias cutoff snapped to divide the box evenly.
    pub dccb_cut: Option<f64>,
    /// Reference potential model used by nodes that enable it.
    pub ref_potential_model: String,
    /// Potential statements forwarded verbatim to the engine script.
    pub potentials: Vec<String>,
    /// Queue time limit in minutes.
    pub num_minutes: u64,
    /// Checkpoint interval in hours, scaled by the slot count.
    pub hours_per_checkpoint: f64,
    /// Bias adjustment interval in hours, scaled by the slot count.
    pub hours_per_adjust: f64,
    /// Scaled budget after which the engine checkpoints and terminates.
    pub hours_terminate: f64,
    /// Parallel compute slots per node; also the per-node window count.
    pub slots: usize,
    /// Trials between analysis writes.
    pub trials_per: f64,
    /// Equilibration trials before production.
    pub equilibration: f64,
    /// Minimum number of macrostates per window.
    pub window_min_size: i64,
    /// Shared macrostates between adjacent windows.
    pub window_overlap: i64,
    /// Per-node derived parameters in ascending node order.
    pub nodes: Vec<NodeParameters>,
}

impl SimulationParameters {
    /// Returns the per-node parameters for the given node index.
    pub fn node(&self, node: NodeId) -> Result<&NodeParameters, FhError> {
        self.nodes
            .get(node.as_raw() as usize)
            .ok_or_else(|| {
                FhError::Config(
                    ErrorInfo::new("unknown-node", "node index out of range")
                        .with_context("node", node.to_string())
                        .with_context("num_nodes", self.nodes.len().to_string()),
                )
            })
    }

    /// Builds the window partitioning input for a node.
    pub fn window_spec(&self, node: &NodeParameters) -> WindowSpec {
        WindowSpec {
            min: node.min_particles,
            max: node.max_particles,
            num: self.slots,
            alpha: node.window_alpha,
            min_size: self.window_min_size,
            overlap: self.window_overlap,
        }
    }
}

fn config_error(code: &str, message: impl Into<String>) -> FhError {
    FhError::Config(ErrorInfo::new(code, message))
}

/// Snaps a requested cutoff to the largest divisor of the box length that
/// does not exceed it, so the simulation cell tiles evenly.
pub fn snap_cutoff(box_length: f64, requested: f64) -> f64 {
    let tiles = (box_length / requested).ceil().max(1.0);
    box_length / tiles
}

/// Deterministically computes all secondary parameters needed downstream.
pub fn derive_parameters(config: &RunConfig) -> Result<SimulationParameters, FhError> {
    let system = &config.system;
    if config.nodes.is_empty() {
        return Err(config_error("no-nodes", "at least one node is required"));
    }
    if system.cubic_box_length <= 0.0 {
        return Err(config_error(
            "bad-box-length",
            format!("cubic_box_length must be positive, got {}", system.cubic_box_length),
        ));
    }
    if system.max_particles <= system.min_particles {
        return Err(config_error(
            "bad-particle-range",
            format!(
                "max_particles {} must exceed min_particles {}",
                system.max_particles, system.min_particles
            ),
        ));
    }

    let beta = match (system.beta, system.temperature) {
        (Some(beta), None) => beta,
        (None, Some(kelvin)) => {
            if kelvin <= 0.0 {
                return Err(config_error(
                    "bad-temperature",
                    format!("temperature must be positive, got {kelvin}"),
                ));
            }
            system.physical_constants.beta_from_temperature(kelvin)
        }
        (Some(_), Some(_)) => {
            return Err(config_error(
                "ambiguous-beta",
                "supply either beta or temperature, not both",
            ))
        }
        (None, None) => {
            return Err(config_error(
                "missing-beta",
                "either beta or temperature is required",
            ))
        }
    };

    let mu = match (system.mu, system.beta_mu) {
        (Some(mu), None) => mu,
        (None, Some(beta_mu)) => beta_mu / beta,
        (Some(_), Some(_)) => {
            return Err(config_error(
                "ambiguous-mu",
                "supply either mu or beta_mu, not both",
            ))
        }
        (None, None) => {
            return Err(config_error("missing-mu", "either mu or beta_mu is required"))
        }
    };

    let dccb_cut = match system.dccb_cut {
        Some(requested) if requested <= 0.0 => {
            return Err(config_error(
                "bad-cutoff",
                format!("dccb_cut must be positive, got {requested}"),
            ))
        }
        Some(requested) => Some(snap_cutoff(system.cubic_box_length, requested)),
        None => None,
    };

    let splits = &config.splice_points;
    if splits.len() + 1 != config.nodes.len() {
        return Err(config_error(
            "bad-splice-points",
            format!(
                "{} nodes require {} splice points, got {}",
                config.nodes.len(),
                config.nodes.len() - 1,
                splits.len()
            ),
        ));
    }
    for pair in splits.windows(2) {
        if pair[1] <= pair[0] {
            return Err(config_error(
                "unsorted-splice-points",
                "splice points must be strictly ascending",
            ));
        }
    }
    if let (Some(first), Some(last)) = (splits.first(), splits.last()) {
        if *first <= system.min_particles || *last >= system.max_particles {
            return Err(config_error(
                "splice-point-out-of-range",
                "splice points must lie strictly inside the global particle range",
            ));
        }
    }

    let slots = config.queue.procs_per_node;
    let scale = slots as f64;
    let time = &config.time;
    let sampling = &config.sampling;

    let mut nodes = Vec::with_capacity(config.nodes.len());
    for (idx, overrides) in config.nodes.iter().enumerate() {
        let min_particles = if idx == 0 {
            system.min_particles
        } else {
            splits[idx - 1]
        };
        let max_particles = if idx == config.nodes.len() - 1 {
            system.max_particles
        } else {
            splits[idx]
        };
        nodes.push(NodeParameters {
            node: NodeId::from_raw(idx as u32),
            min_particles,
            max_particles,
            seed: derive_node_seed(config.seed_policy.master_seed, idx as u64),
            min_sweeps: overrides.min_sweeps.unwrap_or(sampling.min_sweeps),
            window_alpha: overrides.window_alpha.unwrap_or(sampling.window_alpha),
            use_ref_potential: overrides.use_ref_potential,
            gce_trial: overrides.gce_trial.clone().unwrap_or_default(),
        });
    }

    Ok(SimulationParameters {
        beta,
        mu,
        mu_init: system.mu_init,
        cubic_box_length: system.cubic_box_length,
        forcefield: system.forcefield.clone(),
        physical_constants: system.physical_constants,
        dccb_cut,
        ref_potential_model: system.ref_potential_model.clone(),
        potentials: system.potentials.clone(),
        num_minutes: (time.num_hours * 60.0).round() as u64,
        hours_per_checkpoint: time.hours_per_checkpoint * scale,
        hours_per_adjust: time.hours_per_adjust * scale,
        hours_terminate: TERMINATE_FRACTION * time.num_hours * scale,
        slots,
        trials_per: sampling.trials_per,
        equilibration: sampling.equilibration,
        window_min_size: sampling.window_min_size,
        window_overlap: sampling.window_overlap,
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapped_cutoff_divides_box() {
        let cut = snap_cutoff(8.0, 1.0);
        assert!((8.0 / cut).fract().abs() < 1e-12);
        assert!(cut <= 1.0 + 1e-12);
    }

    #[test]
    fn snapped_cutoff_never_exceeds_request() {
        let cut = snap_cutoff(8.0, 3.0);
        assert!((8.0 / cut - 3.0).abs() < 1e-12);
        assert!(cut <= 3.0);
    }

    #[test]
    fn snapped_cutoff_caps_at_box_length() {
        let cut = snap_cutoff(8.0, 20.0);
        assert!((cut - 8.0).abs() < 1e-12);
    }
}
