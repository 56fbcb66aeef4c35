use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fh_core::errors::{ErrorInfo, FhError};
use fh_core::provenance::{RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::splice::SpliceOutcome;
use crate::validate::ValidationReport;

/// Terminal artifact describing the splice post-stage.
///
/// Divergence details live here rather than in the process exit status, so
/// callers never have to re-derive which states diverged or by how much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpliceReport {
    /// Schema version of this payload.
    pub schema: SchemaVersion,
    /// Vertical shift applied at each node boundary, in node order.
    pub shifts: Vec<f64>,
    /// `ln Σ exp` subtracted during renormalization.
    pub log_normalization: f64,
    /// Number of macrostates in the merged profile.
    pub merged_states: usize,
    /// Location of the merged profile CSV.
    pub merged_file: PathBuf,
    /// Validation outcome; absent when no reference dataset was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    /// Provenance metadata describing the run.
    pub provenance: RunProvenance,
}

impl SpliceReport {
    /// Assembles the report for a completed splice.
    pub fn new(
        outcome: &SpliceOutcome,
        merged_file: &Path,
        validation: Option<ValidationReport>,
        config_hash: String,
        seed: u64,
    ) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            schema: SchemaVersion::default(),
            shifts: outcome.shifts.clone(),
            log_normalization: outcome.log_normalization,
            merged_states: outcome.profile.len(),
            merged_file: merged_file.to_path_buf(),
            validation,
            provenance: RunProvenance {
                config_hash,
                seed,
                created_at: Utc::now().to_rfc3339(),
                tool_versions,
            },
        }
    }

    /// Writes the report to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), FhError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                FhError::Serde(
                    ErrorInfo::new("report-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("report-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("report-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a report from disk.
    pub fn load(path: &Path) -> Result<Self, FhError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("report-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("report-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
