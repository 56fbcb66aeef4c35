use std::fs;
use std::path::{Path, PathBuf};

use fh_core::errors::{ErrorInfo, FhError};
use fh_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::derive::SimulationParameters;
use crate::hash::stable_hash_string;
use crate::script::NodePaths;
use crate::window::{partition_windows, Window};

/// Per-node artifact record captured in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeManifest {
    /// Node partition index.
    pub node: NodeId,
    /// Window layout assigned to the node's compute slots.
    pub windows: Vec<Window>,
    /// Declarative script emitted for the fresh start.
    pub script_file: PathBuf,
    /// Engine-owned checkpoint file.
    pub checkpoint_file: PathBuf,
    /// Final log-probability profile.
    pub ln_prob_file: PathBuf,
    /// Window bounds file written by the engine.
    pub bounds_file: PathBuf,
    /// Queue submission script.
    pub queue_file: PathBuf,
}

/// Structured manifest describing a configured launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Canonical hash of the run configuration.
    pub config_hash: String,
    /// Master seed used to derive per-node engine seeds.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Derived parameter set shared by all nodes.
    pub params: SimulationParameters,
    /// Per-node artifact records in ascending node order.
    pub nodes: Vec<NodeManifest>,
}

impl RunManifest {
    /// Builds the manifest for a configured launch rooted at `dir`.
    pub fn build(
        config: &RunConfig,
        params: &SimulationParameters,
        dir: &Path,
    ) -> Result<Self, FhError> {
        let mut nodes = Vec::with_capacity(params.nodes.len());
        for node_params in &params.nodes {
            let windows = partition_windows(&params.window_spec(node_params))?;
            let paths = NodePaths::new(
                dir,
                &config.output.prefix,
                &config.output.checkpoint_extension,
                node_params.node,
            );
            nodes.push(NodeManifest {
                node: node_params.node,
                windows,
                script_file: paths.script,
                checkpoint_file: paths.checkpoint,
                ln_prob_file: paths.ln_prob,
                bounds_file: paths.bounds,
                queue_file: paths.queue,
            });
        }
        Ok(Self {
            config_hash: stable_hash_string(config)?,
            master_seed: config.seed_policy.master_seed,
            seed_label: config.seed_policy.label.clone(),
            params: params.clone(),
            nodes,
        })
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), FhError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                FhError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, FhError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
