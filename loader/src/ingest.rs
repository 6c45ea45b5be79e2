use std::{ops::Range, slice, thread};

use chrono::{Duration, NaiveDateTime};
use collector_data::{slurm::format_datetime_for_slurm, AccountingRecord, Collector, CollectorError, FilterParams};
use database::{resolve_watermark, Store, StoreError, Watermark, WatermarkError};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_PACING: std::time::Duration = std::time::Duration::from_secs(30);
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Length of one collector call in incremental mode, also how far back from the watermark it
    /// starts.
    pub chunk: Duration,
    /// Pause between two windows, keeps the accounting daemon responsive.
    pub pacing: std::time::Duration,
    /// Log progress every this many saved records.
    pub progress_every: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk: Duration::days(1),
            pacing: DEFAULT_PACING,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
    #[error("collecting job reports for {window}")]
    Collector {
        window: String,
        #[source]
        source: CollectorError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Windows processed (including skipped ones). Always 1 for a one-shot load.
    pub windows: usize,
    /// Windows dropped because of a transient collector failure.
    pub skipped_windows: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Consecutive `[start, end)` windows of length `chunk`, beginning one chunk before `watermark`
/// and ending with the last window that closes before `now`.
pub fn chunk_windows(
    watermark: NaiveDateTime,
    now: NaiveDateTime,
    chunk: Duration,
) -> impl Iterator<Item = Range<NaiveDateTime>> {
    let start = watermark - chunk;
    std::iter::successors(Some(start..start + chunk), move |window| Some(window.end..window.end + chunk))
        .take_while(move |window| chunk > Duration::zero() && window.end < now)
}

fn describe(window: &Range<NaiveDateTime>) -> String {
    format!("{}..{}", format_datetime_for_slurm(window.start), format_datetime_for_slurm(window.end))
}

/// Moves records from a [`Collector`] into the [`Store`].
pub struct Ingestor<'s, C> {
    store: &'s mut Store,
    collector: C,
    config: IngestConfig,
}

impl<'s, C: Collector> Ingestor<'s, C> {
    pub fn new(store: &'s mut Store, collector: C, config: IngestConfig) -> Self {
        Self { store, collector, config }
    }

    /// Loads everything from one chunk before the watermark up to `now`, one chunk per collector
    /// call. Records failing to save are logged and skipped. An empty table is an error: there is
    /// nothing to resume from, and loading all of history in one go is not what this mode is for.
    #[instrument(skip(self, params))]
    pub fn run_incremental(&mut self, params: &FilterParams, now: NaiveDateTime) -> Result<IngestSummary, IngestError> {
        let watermark = match resolve_watermark(&*self.store)? {
            Watermark::At(watermark) => watermark,
            Watermark::Absent => return Err(WatermarkError::Absent.into()),
        };
        info!(%watermark, "resuming from watermark");

        let mut summary = IngestSummary::default();
        let mut windows = chunk_windows(watermark, now, self.config.chunk).peekable();
        while let Some(window) = windows.next() {
            summary.windows += 1;
            match self.collector.fetch(&params.with_window(&window)) {
                Ok(records) => {
                    let saved_before = summary.saved;
                    for record in records {
                        match self.store.save(slice::from_ref(&record), true) {
                            Ok(_) => self.count_saved(&mut summary),
                            Err(e) => {
                                error!(job_id = %record.job_id, "saving job report failed: {e:#}");
                                summary.failed += 1;
                            }
                        }
                    }
                    info!(window = %describe(&window), saved = summary.saved - saved_before, "window done");
                }
                Err(e) if e.is_transient() => {
                    warn!(window = %describe(&window), "skipping window: {e}");
                    summary.skipped_windows += 1;
                }
                Err(source) => {
                    return Err(IngestError::Collector {
                        window: describe(&window),
                        source,
                    })
                }
            }

            if windows.peek().is_some() {
                thread::sleep(self.config.pacing);
            }
        }
        self.store.flush()?;

        Ok(summary)
    }

    /// Single collector call with `params` as given, no watermark and no pacing. The first record
    /// failing to save aborts the load, unlike [`Self::run_incremental`].
    // TODO: confirm with operators whether one-shot loads should also log and continue past a bad
    // record; the abort is kept until then.
    #[instrument(skip(self))]
    pub fn ingest_once(&mut self, params: &FilterParams) -> Result<IngestSummary, IngestError> {
        let records = self.collector.fetch(params).map_err(|source| IngestError::Collector {
            window: "the requested parameters".to_owned(),
            source,
        })?;

        let mut summary = IngestSummary {
            windows: 1,
            ..Default::default()
        };
        for record in &records {
            self.save_or_abort(record)?;
            self.count_saved(&mut summary);
        }
        self.store.flush()?;

        Ok(summary)
    }

    fn save_or_abort(&mut self, record: &AccountingRecord) -> Result<(), StoreError> {
        self.store.save(slice::from_ref(record), true).map(|_| ())
    }

    fn count_saved(&self, summary: &mut IngestSummary) {
        summary.saved += 1;
        if self.config.progress_every > 0 && summary.saved % self.config.progress_every == 0 {
            info!("Loaded {} job reports", summary.saved);
        }
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 5, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn chunk_windows__contiguous_days_from_backoff() {
        let now = day(4) + Duration::hours(12);
        let windows = chunk_windows(day(2), now, Duration::days(1)).collect::<Vec<_>>();

        assert_eq!(windows, [day(1)..day(2), day(2)..day(3), day(3)..day(4)]);
        assert!(windows.windows(2).all(|pair| pair[0].end == pair[1].start));
        assert!(windows.iter().all(|w| w.end - w.start == Duration::days(1)));
    }

    #[test]
    fn chunk_windows__window_must_close_before_now() {
        assert_eq!(chunk_windows(day(2), day(3), Duration::days(1)).count(), 1);
        assert_eq!(chunk_windows(day(2), day(2) + Duration::seconds(1), Duration::days(1)).count(), 1);
        assert_eq!(chunk_windows(day(2), day(2), Duration::days(1)).count(), 0);
        assert_eq!(chunk_windows(day(2), day(1), Duration::days(1)).count(), 0);
    }

    #[test]
    fn chunk_windows__count_over_a_month() {
        // watermark 2014-05-01, now 2014-05-31 12:00: windows from 04-30 until 05-31
        let now = day(31) + Duration::hours(12);
        let windows = chunk_windows(day(1), now, Duration::days(1)).collect::<Vec<_>>();

        assert_eq!(windows.len(), 31);
        assert_eq!(windows.first().map(|w| w.start), Some(day(1) - Duration::days(1)));
        assert_eq!(windows.last().map(|w| w.end), Some(day(31)));
    }

    #[test]
    fn chunk_windows__non_positive_chunk_is_empty() {
        assert_eq!(chunk_windows(day(1), day(31), Duration::zero()).count(), 0);
        assert_eq!(chunk_windows(day(1), day(31), Duration::days(-1)).count(), 0);
    }
}
