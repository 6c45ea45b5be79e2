use std::{path::Path, process::Command};

use assert_cmd::prelude::*;
use database::{Store, StoreConfig, Table};
use predicates::prelude::*;
use tempfile::TempDir;

/// `loadreports` run inside `dir`, so no stray config file or environment leaks in.
fn loadreports(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("loadreports").unwrap();
    cmd.current_dir(dir)
        .env_remove("JOBREPORT_DATABASE")
        .env_remove("JOBREPORT_PACING")
        .env_remove("JOBREPORT_PARAM_DELIMITER")
        .env_remove("JOBREPORT_SACCT")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn unreachable_database_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    loadreports(dir.path())
        .args(["--database", "/nonexistent/directory/jobs.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connecting to the job report database"));
}

#[test]
fn incremental_on_empty_database_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("jobs.db");

    loadreports(dir.path())
        .arg("--database")
        .arg(&db)
        .arg("--incremental")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no watermark"));

    // schema was still created, nothing written
    let store = Store::connect(&StoreConfig::new(&db)).unwrap();
    assert_eq!(store.row_count(Table::JobReport).unwrap(), 0);
    assert_eq!(store.row_count(Table::Rejected).unwrap(), 0);
}

#[test]
fn drop_tables_wipes_previous_rows() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("jobs.db");
    {
        let mut store = Store::connect(&StoreConfig::new(&db)).unwrap();
        store.create_schema().unwrap();
        store
            .save(
                &[collector_data::AccountingRecord {
                    job_id: "10048462".to_owned(),
                    start: chrono::NaiveDate::from_ymd_opt(2014, 5, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
                    ..Default::default()
                }],
                true,
            )
            .unwrap();
    }

    // dropping empties the table, so incremental mode has no watermark to resume from
    loadreports(dir.path())
        .arg("--database")
        .arg(&db)
        .args(["--drop-tables", "--incremental"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no watermark"));

    let store = Store::connect(&StoreConfig::new(&db)).unwrap();
    assert_eq!(store.row_count(Table::JobReport).unwrap(), 0);
}

#[test]
fn malformed_sacct_parameters_exit_non_zero() {
    let dir = TempDir::new().unwrap();
    loadreports(dir.path())
        .arg("--database")
        .arg(dir.path().join("jobs.db"))
        .arg("--sacct-parameters=user=a=b")
        .assert()
        .failure()
        .stderr(predicate::str::contains("can't parse filter parameter `user=a=b`"));
}

#[test]
fn database_from_environment() {
    let dir = TempDir::new().unwrap();
    loadreports(dir.path())
        .env("JOBREPORT_DATABASE", "/nonexistent/directory/env.db")
        .assert()
        .failure()
        .stderr(predicate::str::contains("env.db"));
}
