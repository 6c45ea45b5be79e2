pub mod collector;
pub mod filter;
pub mod misc;
pub mod record;
pub mod sacct;
pub mod slurm;

pub use collector::{Collector, CollectorError};
pub use filter::{FilterParams, FilterValue};
pub use record::{AccountingRecord, AccountingRecordBuilder};
