use std::fs;
use std::path::Path;
use std::process::Command;

fn fh_binary() -> &'static str {
    env!("CARGO_BIN_EXE_fh")
}

#[test]
fn help_exits_cleanly() {
    let output = Command::new(fh_binary())
        .arg("--help")
        .output()
        .expect("run fh");
    assert!(output.status.success());
}

#[test]
fn missing_config_is_a_failure() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let output = Command::new(fh_binary())
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .output()
        .expect("run fh");
    assert!(!output.status.success());
}

#[test]
fn unrecognized_run_type_is_a_failure() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let config = dir.path().join("run.yaml");
    fs::write(
        &config,
        "system:\n  cubic_box_length: 8.0\n  forcefield: lj.txt\n  max_particles: 20\n  beta: 1.0\n  mu: -2.0\nqueue:\n  procs_per_node: 4\nnodes:\n  - {}\n",
    )
    .expect("write config");
    let output = Command::new(fh_binary())
        .arg("--config")
        .arg(&config)
        .arg("--run_type")
        .arg("7")
        .output()
        .expect("run fh");
    assert!(!output.status.success());
}

#[cfg(unix)]
fn write_executable(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, contents).expect("write script");
    let mut perms = fs::metadata(path).expect("stat").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

/// Runs a complete single-node launch locally against a stub engine: the
/// unit completes, the ledger gates open, and the splice post-stage writes
/// the merged profile and report.
#[cfg(unix)]
#[test]
fn local_run_completes_and_splices() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let fst = dir.path().join("fake-fst");
    write_executable(
        &fst,
        r#"#!/bin/sh
input=$(cat)
lnpi=$(printf '%s\n' "$input" | awk '/^CollectionMatrixSplice/ {for (i=1;i<NF;i++) if ($i=="ln_prob_file") print $(i+1)}')
min=$(printf '%s\n' "$input" | awk '/^WindowExponential/ {for (i=1;i<NF;i++) if ($i=="minimum") print $(i+1)}')
max=$(printf '%s\n' "$input" | awk '/^WindowExponential/ {for (i=1;i<NF;i++) if ($i=="maximum") print $(i+1)}')
printf 'state,ln_prob\n' > "$lnpi"
i=$min
while [ "$i" -le "$max" ]; do
  printf '%s,-%s.5\n' "$i" "$i" >> "$lnpi"
  i=$((i+1))
done
exit 0
"#,
    );

    let config = dir.path().join("run.yaml");
    fs::write(
        &config,
        format!(
            "system:\n  cubic_box_length: 8.0\n  forcefield: lj.txt\n  max_particles: 20\n  beta: 1.0\n  mu: -2.0\nqueue:\n  procs_per_node: 4\nengine:\n  fresh_command: {fst}\n  resume_command: {fst}\nnodes:\n  - {{}}\n",
            fst = fst.display()
        ),
    )
    .expect("write config");

    let output = Command::new(fh_binary())
        .arg("--config")
        .arg(&config)
        .arg("--run_type")
        .arg("1")
        .arg("--task")
        .arg("0")
        .arg("--node")
        .arg("0")
        .arg("--dir")
        .arg(dir.path())
        .output()
        .expect("run fh");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(dir.path().join("fh_lnpin0.txt").exists());
    assert!(dir.path().join("fh_lnpi.csv").exists());
    assert!(dir.path().join("splice_report.json").exists());
    let report = fs::read_to_string(dir.path().join("splice_report.json")).expect("report");
    assert!(report.contains("\"merged_states\": 21"));
}
