use std::{collections::HashMap, path::PathBuf};

use collector_data::misc::parsing::Duration;
use config::{Config, ConfigError, Environment, File};
use database::{StoreConfig, DEFAULT_COMMIT_EVERY};
use serde::Deserialize;

use crate::{
    cli::Args,
    ingest::{IngestConfig, DEFAULT_PROGRESS_EVERY},
};

pub const ENV_PREFIX: &str = "JOBREPORT";

const DEFAULT_DATABASE: &str = "jobreport.db";
const DEFAULT_PACING: &str = "30s";
const DEFAULT_PARAM_DELIMITER: &str = ",";
const DEFAULT_SACCT: &str = "sacct";
const DEFAULT_CONFIG_FILE: &str = "config/loadreports";

/// Everything configurable, resolved once at startup. Precedence, lowest first: defaults,
/// `config/loadreports.toml`, `--config`, `JOBREPORT_*` environment variables, command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: PathBuf,
    pub pacing: Duration,
    pub commit_every: usize,
    pub progress_every: usize,
    pub param_delimiter: String,
    pub sacct: String,
}

impl Settings {
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        Self::load_with_env(args, None)
    }

    /// `env` replaces the process environment, for tests.
    pub fn load_with_env(args: &Args, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database", DEFAULT_DATABASE)?
            .set_default("pacing", DEFAULT_PACING)?
            .set_default("commit_every", DEFAULT_COMMIT_EVERY as i64)?
            .set_default("progress_every", DEFAULT_PROGRESS_EVERY as i64)?
            .set_default("param_delimiter", DEFAULT_PARAM_DELIMITER)?
            .set_default("sacct", DEFAULT_SACCT)?
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.as_path()));
        }

        let settings: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .set_override_option("database", args.database.as_ref().map(|p| p.to_string_lossy().into_owned()))?
            .set_override_option("pacing", args.pacing.clone())?
            .set_override_option("param_delimiter", args.param_delimiter.clone())?
            .build()?
            .try_deserialize()?;

        if settings.param_delimiter.is_empty() {
            return Err(ConfigError::Message("param_delimiter must not be empty".to_owned()));
        }
        Ok(settings)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            target: self.database.clone(),
            commit_every: self.commit_every,
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            pacing: self.pacing.to_std(),
            progress_every: self.progress_every,
            ..Default::default()
        }
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use std::io::Write as _;

    use clap::Parser as _;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("loadreports").chain(argv.iter().copied())).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect())
    }

    #[test]
    fn Settings__load__defaults() {
        let settings = Settings::load_with_env(&args(&[]), env(&[])).unwrap();
        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.ingest_config().pacing, std::time::Duration::from_secs(30));
        assert_eq!(settings.store_config().commit_every, DEFAULT_COMMIT_EVERY);
        assert_eq!(settings.param_delimiter, ",");
        assert_eq!(settings.sacct, "sacct");
    }

    #[test]
    fn Settings__load__environment() {
        let settings = Settings::load_with_env(
            &args(&[]),
            env(&[("JOBREPORT_DATABASE", "/var/lib/jobs.db"), ("JOBREPORT_COMMIT_EVERY", "10"), ("JOBREPORT_PACING", "2m")]),
        )
        .unwrap();
        assert_eq!(settings.database, PathBuf::from("/var/lib/jobs.db"));
        assert_eq!(settings.commit_every, 10);
        assert_eq!(settings.ingest_config().pacing, std::time::Duration::from_secs(120));
    }

    #[test]
    fn Settings__load__flags_beat_environment() {
        let settings = Settings::load_with_env(
            &args(&["--database", "cli.db", "--pacing", "0s", "--param-delimiter", ";"]),
            env(&[("JOBREPORT_DATABASE", "env.db"), ("JOBREPORT_PACING", "2m")]),
        )
        .unwrap();
        assert_eq!(settings.database, PathBuf::from("cli.db"));
        assert_eq!(settings.ingest_config().pacing, std::time::Duration::ZERO);
        assert_eq!(settings.param_delimiter, ";");
    }

    #[test]
    fn Settings__load__config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "database = \"file.db\"\nprogress_every = 5\nsacct = \"/opt/slurm/bin/sacct\"").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let settings = Settings::load_with_env(&args(&["--config", &path]), env(&[])).unwrap();
        assert_eq!(settings.database, PathBuf::from("file.db"));
        assert_eq!(settings.progress_every, 5);
        assert_eq!(settings.sacct, "/opt/slurm/bin/sacct");
    }

    #[test]
    fn Settings__load__invalid_values() {
        assert!(Settings::load_with_env(&args(&["--pacing", "soon"]), env(&[])).is_err());
        assert!(Settings::load_with_env(&args(&["--param-delimiter", ""]), env(&[])).is_err());
    }
}
