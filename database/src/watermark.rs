use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::{
    error::WatermarkError,
    schema::{Table, START},
    store::Store,
};

/// Latest `Start` already persisted. Recomputed from the table on every run, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Empty table (or no row with a `Start`): nothing to resume from.
    Absent,
    At(NaiveDateTime),
}

/// `max(Start)` over `jobreport`. A missing table is an error, an empty one is [`Watermark::Absent`].
#[instrument(skip(store))]
pub fn resolve_watermark(store: &Store) -> Result<Watermark, WatermarkError> {
    let sql = format!("SELECT max(\"{START}\") FROM \"{}\"", Table::JobReport.name());
    let max_start: Option<NaiveDateTime> = store
        .connection()
        .query_row(&sql, [], |row| row.get(0))
        .map_err(WatermarkError::Unresolvable)?;
    debug!(?max_start, "resolved watermark");

    Ok(max_start.map_or(Watermark::Absent, Watermark::At))
}
