//! Log-probability profile type and tabular IO.

use std::fs::File;
use std::path::Path;

use fh_core::errors::{ErrorInfo, FhError};
use serde::{Deserialize, Serialize};

/// One `(state, ln_prob)` row of a profile file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ProfileRow {
    state: i64,
    ln_prob: f64,
}

/// Ordered sequence of `(state, ln_prob)` pairs covering a contiguous
/// macrostate range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityProfile {
    states: Vec<i64>,
    ln_probs: Vec<f64>,
}

fn splice_error(code: &str, message: impl Into<String>) -> FhError {
    FhError::Splice(ErrorInfo::new(code, message))
}

fn io_error(code: &str, path: &Path, err: impl ToString) -> FhError {
    FhError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

impl ProbabilityProfile {
    /// Builds a profile from parallel state and value vectors.
    ///
    /// States must form one contiguous ascending integer sequence.
    pub fn new(states: Vec<i64>, ln_probs: Vec<f64>) -> Result<Self, FhError> {
        if states.is_empty() {
            return Err(splice_error("empty-profile", "profile has no states"));
        }
        if states.len() != ln_probs.len() {
            return Err(splice_error(
                "length-mismatch",
                format!(
                    "{} states but {} ln_prob values",
                    states.len(),
                    ln_probs.len()
                ),
            ));
        }
        for pair in states.windows(2) {
            if pair[1] != pair[0] + 1 {
                return Err(splice_error(
                    "non-contiguous-profile",
                    format!("state {} follows {}", pair[1], pair[0]),
                ));
            }
        }
        Ok(Self { states, ln_probs })
    }

    /// Reads a profile from a `state,ln_prob` CSV file.
    pub fn read_csv(path: &Path) -> Result<Self, FhError> {
        let file = File::open(path).map_err(|err| io_error("profile-open", path, err))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut states = Vec::new();
        let mut ln_probs = Vec::new();
        for record in reader.deserialize() {
            let row: ProfileRow = record.map_err(|err| io_error("profile-parse", path, err))?;
            states.push(row.state);
            ln_probs.push(row.ln_prob);
        }
        Self::new(states, ln_probs)
    }

    /// Writes the profile as a `state,ln_prob` CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<(), FhError> {
        let file = File::create(path).map_err(|err| io_error("profile-create", path, err))?;
        let mut writer = csv::Writer::from_writer(file);
        for (state, ln_prob) in self.iter() {
            writer
                .serialize(ProfileRow { state, ln_prob })
                .map_err(|err| io_error("profile-write", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| io_error("profile-flush", path, err))
    }

    /// Number of macrostates in the profile.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the profile holds no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Smallest macrostate of the profile.
    pub fn first_state(&self) -> i64 {
        self.states[0]
    }

    /// Largest macrostate of the profile.
    pub fn last_state(&self) -> i64 {
        *self.states.last().expect("profiles are never empty")
    }

    /// Value at the smallest macrostate.
    pub fn first_ln_prob(&self) -> f64 {
        self.ln_probs[0]
    }

    /// Value at the largest macrostate.
    pub fn last_ln_prob(&self) -> f64 {
        *self.ln_probs.last().expect("profiles are never empty")
    }

    /// Read access to the state axis.
    pub fn states(&self) -> &[i64] {
        &self.states
    }

    /// Read access to the values.
    pub fn ln_probs(&self) -> &[f64] {
        &self.ln_probs
    }

    /// Iterates over `(state, ln_prob)` pairs in ascending state order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.states
            .iter()
            .copied()
            .zip(self.ln_probs.iter().copied())
    }

    /// Adds a scalar shift to every value.
    pub fn shift(&mut self, delta: f64) {
        for value in &mut self.ln_probs {
            *value += delta;
        }
    }

    /// Total probability `Σ exp(ln_prob)` over the profile.
    pub fn total_probability(&self) -> f64 {
        self.ln_probs.iter().map(|value| value.exp()).sum()
    }
}
