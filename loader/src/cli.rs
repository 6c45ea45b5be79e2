use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::Level;

/// Load job reports from sacct into database tables
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "loadreports")]
pub struct Args {
    /// Increase output (`-v` debug, `-vv` trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Database file, overrides `JOBREPORT_DATABASE`
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Additional toml configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// If tables exist, drop them first
    #[arg(long)]
    pub drop_tables: bool,

    /// Load everything since the latest loaded job start, one day per sacct call
    #[arg(long)]
    pub incremental: bool,

    /// sacct parameters, e.g. --sacct-parameters="user=akitzmiller,starttime=2014-05-01"
    #[arg(long)]
    pub sacct_parameters: Option<String>,

    /// Separator between sacct parameters (default `,`)
    #[arg(long)]
    pub param_delimiter: Option<String>,

    /// Pause between sacct calls in incremental mode, e.g. `30s`
    #[arg(long)]
    pub pacing: Option<String>,
}

impl Args {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
