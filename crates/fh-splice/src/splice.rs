//! Multi-segment profile alignment, concatenation, and renormalization.

use fh_core::errors::{ErrorInfo, FhError};

use crate::profile::ProbabilityProfile;

/// Result of splicing per-node profiles into one global profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceOutcome {
    /// Merged, renormalized profile over the full macrostate range.
    pub profile: ProbabilityProfile,
    /// Vertical shift applied to each later segment, one per node boundary.
    pub shifts: Vec<f64>,
    /// `ln Σ exp` subtracted from every value during renormalization.
    pub log_normalization: f64,
}

fn splice_error(code: &str, message: impl Into<String>) -> FhError {
    FhError::Splice(ErrorInfo::new(code, message))
}

/// Numerically stable `ln Σ exp(values)`.
fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let sum: f64 = values.iter().map(|value| (value - max).exp()).sum();
    max + sum.ln()
}

/// Merges per-node profiles, in ascending node order, into one continuous
/// renormalized profile.
///
/// For each adjacent pair the later profile is shifted vertically so its
/// value at the shared boundary state matches the earlier profile's, then
/// concatenated with the duplicate boundary state dropped. The concatenation
/// is finally renormalized so probabilities sum to one.
pub fn splice_profiles(profiles: &[ProbabilityProfile]) -> Result<SpliceOutcome, FhError> {
    let (first, rest) = profiles.split_first().ok_or_else(|| {
        splice_error("no-profiles", "at least one node profile is required")
    })?;

    let mut states: Vec<i64> = first.states().to_vec();
    let mut ln_probs: Vec<f64> = first.ln_probs().to_vec();
    let mut shifts = Vec::with_capacity(rest.len());

    for (idx, later) in rest.iter().enumerate() {
        let boundary = *states.last().expect("profiles are never empty");
        if later.first_state() != boundary {
            return Err(splice_error(
                "missing-overlap",
                format!(
                    "profile {} starts at state {}, expected the boundary state {}",
                    idx + 1,
                    later.first_state(),
                    boundary
                ),
            ));
        }
        let shift = *ln_probs.last().expect("non-empty") - later.first_ln_prob();
        shifts.push(shift);
        states.extend_from_slice(&later.states()[1..]);
        ln_probs.extend(later.ln_probs()[1..].iter().map(|value| value + shift));
    }

    let log_normalization = log_sum_exp(&ln_probs);
    for value in &mut ln_probs {
        *value -= log_normalization;
    }

    let profile = ProbabilityProfile::new(states, ln_probs)?;
    Ok(SpliceOutcome {
        profile,
        shifts,
        log_normalization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_exp_handles_large_magnitudes() {
        let values = [-1000.0, -1000.0];
        let result = log_sum_exp(&values);
        assert!((result - (-1000.0 + 2.0_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn single_profile_is_renormalized_in_place() {
        let profile =
            ProbabilityProfile::new(vec![0, 1], vec![-1.0, -2.0]).expect("profile");
        let outcome = splice_profiles(&[profile]).expect("splice");
        assert!(outcome.shifts.is_empty());
        assert!((outcome.profile.total_probability() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_a_caller_error() {
        let err = splice_profiles(&[]).expect_err("must fail");
        assert!(matches!(err, FhError::Splice(_)));
    }
}
