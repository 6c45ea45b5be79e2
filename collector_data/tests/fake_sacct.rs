#![cfg(unix)]

use std::{fs, io::Write as _, os::unix::fs::PermissionsExt as _, path::PathBuf};

use collector_data::{filter::STARTTIME, sacct::Sacct, Collector as _, CollectorError, FilterParams};
use color_eyre::Result;
use tempfile::TempDir;

/// Executable shell script standing in for `sacct`.
fn fake_sacct(dir: &TempDir, body: &str) -> Result<PathBuf> {
    let path = dir.path().join("sacct");
    let mut file = fs::File::create(&path)?;
    writeln!(file, "#!/bin/sh\n{body}")?;
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

fn sacct_at(path: &std::path::Path) -> Sacct {
    Sacct::new(path.to_string_lossy())
}

#[test]
fn fetch_parses_output() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fake_sacct(
        &dir,
        "echo '10213033|akitzmiller|bash|COMPLETED|interact|1|1|01:27:02|00:03.319|00:01.623|00:01.695|2000Mn|5656K|2014-05-05T14:20:40|2014-05-05T15:47:42|holy2a18208'",
    )?;

    let records = sacct_at(&path).fetch(&FilterParams::new())?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].job_id, "10213033");
    assert_eq!(records[0].max_rss_kb, Some(5656));
    Ok(())
}

#[test]
fn fetch_forwards_params() -> Result<()> {
    let dir = TempDir::new()?;
    let args_file = dir.path().join("args");
    let path = fake_sacct(&dir, &format!("echo \"$@\" > '{}'", args_file.display()))?;
    let mut params = FilterParams::new();
    params.set(STARTTIME, "2014-05-01").set_flag("allusers");

    let records = sacct_at(&path).fetch(&params)?;

    assert!(records.is_empty());
    let args = fs::read_to_string(&args_file)?;
    assert!(args.starts_with("--noheader --parsable2 --format=JobID,"), "{args}");
    assert!(args.trim_end().ends_with("--allusers --starttime=2014-05-01"), "{args}");
    Ok(())
}

#[test]
fn fetch_classifies_known_diagnostic_as_transient() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fake_sacct(
        &dir,
        "echo 'sacct: error: slurm_persist_conn_open: Socket timed out on send/recv operation' >&2\nexit 1",
    )?;

    let err = sacct_at(&path).fetch(&FilterParams::new()).unwrap_err();
    assert!(err.is_transient(), "{err:?}");
    Ok(())
}

#[test]
fn fetch_reports_other_failures() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fake_sacct(&dir, "echo 'sacct: error: Invalid user id' >&2\nexit 1")?;

    let err = sacct_at(&path).fetch(&FilterParams::new()).unwrap_err();
    assert!(
        matches!(&err, CollectorError::Command { status: Some(1), stderr, .. } if stderr.contains("Invalid user id")),
        "{err:?}"
    );

    let err = sacct_at(&path)
        .with_transient_diagnostics(["Invalid user id"])
        .fetch(&FilterParams::new())
        .unwrap_err();
    assert!(err.is_transient());
    Ok(())
}
