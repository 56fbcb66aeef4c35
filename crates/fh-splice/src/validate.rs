//! Statistical regression check of a merged profile against a trusted
//! reference curve.
//!
//! The comparison is on first differences of the log-probability, which are
//! insensitive to the arbitrary overall normalization of either curve. This
//! is a regression check, not a physical correctness proof.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use fh_core::errors::{ErrorInfo, FhError};
use serde::{Deserialize, Serialize};

use crate::profile::ProbabilityProfile;

/// Fixed flagging threshold in units of the reference standard deviation.
const SIGMA_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy, Deserialize)]
struct ReferenceRow {
    state: i64,
    delta_ln_prob: f64,
    delta_ln_prob_stdev: f64,
}

/// Reference first differences with reported uncertainties, keyed by state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProfile {
    rows: BTreeMap<i64, (f64, f64)>,
}

impl ReferenceProfile {
    /// Reads a reference dataset from a CSV file with `state`,
    /// `delta_ln_prob`, and `delta_ln_prob_stdev` columns.
    pub fn read_csv(path: &Path) -> Result<Self, FhError> {
        let file = File::open(path).map_err(|err| {
            FhError::Serde(
                ErrorInfo::new("reference-open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut rows = BTreeMap::new();
        for record in reader.deserialize() {
            let row: ReferenceRow = record.map_err(|err| {
                FhError::Serde(
                    ErrorInfo::new("reference-parse", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            rows.insert(row.state, (row.delta_ln_prob, row.delta_ln_prob_stdev));
        }
        if rows.is_empty() {
            return Err(FhError::Serde(
                ErrorInfo::new("reference-empty", "reference dataset has no rows")
                    .with_context("path", path.display().to_string()),
            ));
        }
        Ok(Self { rows })
    }

    /// Builds a reference from `(state, expected delta, stdev)` triples.
    pub fn from_rows(rows: impl IntoIterator<Item = (i64, f64, f64)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(state, delta, stdev)| (state, (delta, stdev)))
                .collect(),
        }
    }
}

/// One state whose first difference deviates beyond the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    /// Macrostate at which the deviation was observed.
    pub state: i64,
    /// First difference of the merged profile at this state.
    pub measured_delta: f64,
    /// Expected first difference from the reference.
    pub expected_delta: f64,
    /// Reported standard deviation of the reference at this state.
    pub stdev: f64,
    /// Absolute deviation between measured and expected.
    pub deviation: f64,
}

/// Outcome of comparing a merged profile against a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True iff no state diverged beyond the threshold.
    pub passed: bool,
    /// Number of states compared (present in both curves).
    pub compared: usize,
    /// States flagged as statistically divergent.
    pub divergences: Vec<Divergence>,
}

/// Compares the merged profile's first differences against the reference,
/// flagging states whose absolute deviation exceeds six reported standard
/// deviations.
pub fn validate_profile(
    merged: &ProbabilityProfile,
    reference: &ReferenceProfile,
) -> ValidationReport {
    let states = merged.states();
    let ln_probs = merged.ln_probs();
    let mut compared = 0;
    let mut divergences = Vec::new();
    for idx in 1..states.len() {
        let state = states[idx];
        let Some(&(expected_delta, stdev)) = reference.rows.get(&state) else {
            continue;
        };
        compared += 1;
        let measured_delta = ln_probs[idx] - ln_probs[idx - 1];
        let deviation = (measured_delta - expected_delta).abs();
        if deviation > SIGMA_THRESHOLD * stdev {
            divergences.push(Divergence {
                state,
                measured_delta,
                expected_delta,
                stdev,
                deviation,
            });
        }
    }
    ValidationReport {
        passed: divergences.is_empty(),
        compared,
        divergences,
    }
}
