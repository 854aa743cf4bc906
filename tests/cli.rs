//! End-to-end tests for the `fsmgrade` binary: write fixtures to a temp
//! directory and drive the two subcommands as a user would.

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn fsmgrade() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fsmgrade"))
}

const TOGGLE: &str = include_str!("fixtures/toggle_moore.json");
const BROKEN: &str = include_str!("fixtures/broken_coverage.json");
const TOGGLE_CANONICAL: &str = include_str!("fixtures/toggle_moore_canonical.json");

#[test]
fn gate_passes_consistent_fixture() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore.json"), TOGGLE).unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("[PASS] toggle_moore.json"));
}

#[test]
fn gate_fails_on_incomplete_coverage() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken_coverage.json"), BROKEN).unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("[FAIL] broken_coverage.json"));
}

#[test]
fn rubric_reports_full_score_for_consistent_fixture() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore.json"), TOGGLE).unwrap();

    let output = fsmgrade()
        .args(["rubric", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("File: toggle_moore.json"));
    assert!(stdout.contains("Total: 86.00/86.00"));
}

#[test]
fn gate_respects_min_states_override() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore.json"), TOGGLE).unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .args(["--min-states", "5"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Requires at least 5"));
}

#[test]
fn gate_empty_directory_fails() {
    let dir = tempdir().unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn rubric_writes_grading_results_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore.json"), TOGGLE).unwrap();

    let output = fsmgrade()
        .args(["rubric", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let report = fs::read_to_string(dir.path().join("grading_results.txt")).unwrap();
    assert!(report.contains("File: toggle_moore.json"));
    assert!(report.contains("Total: 86.00/86.00"));
}

/// Exercises a save file in true spec-format shape: `transitionTable` has
/// `columns`/`cells` only, no `rows`/`valueColumns` — those must be
/// synthesized from `columns`/`cells` for gate mode to see any transitions.
#[test]
fn gate_passes_canonical_columns_and_cells_fixture() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore_canonical.json"), TOGGLE_CANONICAL).unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("[PASS] toggle_moore_canonical.json"));
}

#[test]
fn rubric_scores_canonical_columns_and_cells_fixture_fully() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore_canonical.json"), TOGGLE_CANONICAL).unwrap();

    let output = fsmgrade()
        .args(["rubric", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("File: toggle_moore_canonical.json"));
    assert!(stdout.contains("Total: 86.00/86.00"));
}

#[test]
fn snapshot_gate_report_for_broken_fixture() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken_coverage.json"), BROKEN).unwrap();

    let output = fsmgrade()
        .args(["gate", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout);
}

#[test]
fn snapshot_rubric_report_for_consistent_fixture() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("toggle_moore.json"), TOGGLE).unwrap();

    let output = fsmgrade()
        .args(["rubric", "--path"])
        .arg(dir.path())
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout);
}
