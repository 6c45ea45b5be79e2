use chrono::Local;
use clap::Parser as _;
use collector_data::{sacct::Sacct, FilterParams};
use color_eyre::{eyre::WrapErr as _, Result};
use database::{Store, Table};
use loader::{cli::Args, Ingestor, Settings};
use tracing::{info, instrument, Level};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    register_logging(args.log_level())?;

    let settings = Settings::load(&args).wrap_err("loading configuration")?;
    run(&args, &settings)
}

fn register_logging(level: Level) -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        // stdout stays free for whoever pipes us
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).wrap_err("setting default subscriber failed")
}

#[instrument(skip_all, fields(database = %settings.database.display()))]
fn run(args: &Args, settings: &Settings) -> Result<()> {
    let mut store = Store::connect(&settings.store_config()).wrap_err("connecting to the job report database")?;

    if args.drop_tables {
        store.drop_schema()?;
    }
    store.create_schema()?;

    let params = match &args.sacct_parameters {
        Some(input) => FilterParams::parse(input, &settings.param_delimiter)?,
        None => FilterParams::new(),
    };

    let collector = Sacct::new(&settings.sacct);
    let mut ingestor = Ingestor::new(&mut store, collector, settings.ingest_config());
    let summary = if args.incremental {
        ingestor
            .run_incremental(&params, Local::now().naive_local())
            .wrap_err("incremental load")?
    } else {
        ingestor.ingest_once(&params).wrap_err("loading job reports")?
    };

    info!(
        windows = summary.windows,
        skipped_windows = summary.skipped_windows,
        failed = summary.failed,
        rows = store.row_count(Table::JobReport)?,
        "Finished loading {} job reports",
        summary.saved
    );
    Ok(())
}
