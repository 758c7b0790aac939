//! End-to-end CLI scenarios, run against the real binary with `assert_cmd`
//! over a fresh temp data directory per test (no shared process state).

use assert_cmd::Command;
use predicates::prelude::*;

fn cli(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("do-memory-cli").unwrap();
    cmd.env("CLAUDE_RAG_DATA_DIR", data_dir);
    cmd
}

#[test]
fn archival_status_on_fresh_store_reports_no_projects() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["archival", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No projects tracked yet."));
}

#[test]
fn archival_archive_on_unknown_project_reports_failure_without_erroring() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["archival", "archive", "nonexistent-project"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn archival_list_exportable_on_fresh_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["archival", "list-exportable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No archived projects available to export."));
}

#[test]
fn health_dashboard_on_empty_store_grades_excellent() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "dashboard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Overall health"))
        .stdout(predicate::str::contains("Excellent"));
}

#[test]
fn health_dashboard_json_flag_forces_json_regardless_of_global_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(dir.path())
        .args(["--format", "human", "health", "dashboard", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).expect("dashboard --json must emit valid JSON");
    assert_eq!(parsed["grade"], "Excellent");
}

#[test]
fn health_monitor_history_on_fresh_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "monitor", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No maintenance jobs have run yet."));
}

#[test]
fn health_monitor_report_runs_without_mutating_anything() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "monitor", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("weekly_health_report"));
}

#[test]
fn health_monitor_fix_defaults_to_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "monitor", "fix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn health_schedule_status_reports_disabled_by_default() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "schedule", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled="));
}

#[test]
fn health_schedule_enable_is_a_no_op_while_the_top_level_switch_is_off() {
    // HealthScheduleConfig defaults to enabled=false even though individual
    // job triggers default to enabled=true; `enable` must not start the
    // cron loop until the top-level switch is flipped on.
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "schedule", "enable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already in that state"));
    cli(dir.path())
        .args(["health", "schedule", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("running=false"));
}

#[test]
fn health_schedule_test_all_runs_every_job_as_a_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["health", "schedule", "test", "--job", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("weekly_archival"))
        .stdout(predicate::str::contains("monthly_cleanup"))
        .stdout(predicate::str::contains("weekly_health_report"));
}
