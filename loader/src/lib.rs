pub mod cli;
pub mod config;
pub mod ingest;

pub use crate::config::Settings;
pub use crate::ingest::{chunk_windows, IngestConfig, IngestError, IngestSummary, Ingestor};
