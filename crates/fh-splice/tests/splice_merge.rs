use fh_core::FhError;
use fh_splice::profile::ProbabilityProfile;
use fh_splice::splice::splice_profiles;

fn profile(min: i64, max: i64, value: impl Fn(i64) -> f64) -> ProbabilityProfile {
    let states: Vec<i64> = (min..=max).collect();
    let ln_probs: Vec<f64> = states.iter().map(|&state| value(state)).collect();
    ProbabilityProfile::new(states, ln_probs).expect("profile")
}

#[test]
fn two_node_merge_matches_the_reference_scenario() {
    // Node 0 covers [0, 375] ending at -10.0; node 1 covers [375, 475]
    // starting at -10.5, so the splice shift is exactly 0.5.
    let node0 = profile(0, 375, |state| -10.0 * state as f64 / 375.0);
    let node1 = profile(375, 475, |state| -10.5 - 0.05 * (state - 375) as f64);

    let outcome = splice_profiles(&[node0, node1]).expect("splice");
    assert_eq!(outcome.shifts.len(), 1);
    assert!((outcome.shifts[0] - 0.5).abs() < 1e-12);

    let merged = &outcome.profile;
    assert_eq!(merged.len(), 476);
    assert_eq!(merged.first_state(), 0);
    assert_eq!(merged.last_state(), 475);
    // No duplicate at the boundary state.
    assert_eq!(
        merged.states().iter().filter(|&&state| state == 375).count(),
        1
    );
    assert!((merged.total_probability() - 1.0).abs() < 1e-9);
}

#[test]
fn merged_states_ascend_in_unit_steps() {
    let node0 = profile(0, 40, |state| -0.05 * state as f64);
    let node1 = profile(40, 90, |state| -3.0 - 0.02 * state as f64);
    let merged = splice_profiles(&[node0, node1]).expect("splice").profile;
    for pair in merged.states().windows(2) {
        assert_eq!(pair[1], pair[0] + 1);
    }
}

#[test]
fn three_node_splice_is_associative() {
    let a = profile(0, 100, |state| -0.02 * state as f64);
    let b = profile(100, 200, |state| 3.0 - 0.03 * state as f64);
    let c = profile(200, 300, |state| -7.0 + 0.01 * state as f64);

    let all_at_once = splice_profiles(&[a.clone(), b.clone(), c.clone()])
        .expect("splice")
        .profile;

    let first_pair = splice_profiles(&[a, b]).expect("splice").profile;
    let stepwise = splice_profiles(&[first_pair, c]).expect("splice").profile;

    assert_eq!(all_at_once.states(), stepwise.states());
    for (lhs, rhs) in all_at_once.ln_probs().iter().zip(stepwise.ln_probs()) {
        assert!((lhs - rhs).abs() < 1e-9);
    }
}

#[test]
fn profiles_without_a_shared_boundary_state_cannot_merge() {
    let node0 = profile(0, 40, |state| -0.05 * state as f64);
    let node1 = profile(42, 90, |state| -0.05 * state as f64);
    let err = splice_profiles(&[node0, node1]).expect_err("must fail");
    assert!(matches!(err, FhError::Splice(_)));
    assert_eq!(err.info().code, "missing-overlap");
}

#[test]
fn csv_profiles_merge_end_to_end() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path0 = dir.path().join("fh_lnpin0.txt");
    let path1 = dir.path().join("fh_lnpin1.txt");
    profile(0, 20, |state| -0.2 * state as f64)
        .write_csv(&path0)
        .expect("write node 0");
    profile(20, 35, |state| -5.0 - 0.1 * state as f64)
        .write_csv(&path1)
        .expect("write node 1");

    let profiles = vec![
        ProbabilityProfile::read_csv(&path0).expect("read node 0"),
        ProbabilityProfile::read_csv(&path1).expect("read node 1"),
    ];
    let outcome = splice_profiles(&profiles).expect("splice");
    assert_eq!(outcome.profile.len(), 36);
    assert!((outcome.profile.total_probability() - 1.0).abs() < 1e-9);
}
