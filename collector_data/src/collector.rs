use std::io;

use thiserror::Error;

use crate::{filter::FilterParams, record::AccountingRecord};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("could not run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Known, ignorable hiccup of the accounting command. Callers iterating over windows may
    /// skip the window and go on.
    #[error("`{program}` reported a transient failure: {diagnostic}")]
    Transient { program: String, diagnostic: String },
    #[error("`{program}` failed with status {status:?}: {stderr}")]
    Command {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl CollectorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CollectorError::Transient { .. })
    }
}

/// Source of accounting records, e.g. a wrapper around `sacct`.
pub trait Collector {
    fn fetch(&mut self, params: &FilterParams) -> Result<Vec<AccountingRecord>, CollectorError>;
}

impl<C: Collector + ?Sized> Collector for &mut C {
    fn fetch(&mut self, params: &FilterParams) -> Result<Vec<AccountingRecord>, CollectorError> {
        (**self).fetch(params)
    }
}

impl<C: Collector + ?Sized> Collector for Box<C> {
    fn fetch(&mut self, params: &FilterParams) -> Result<Vec<AccountingRecord>, CollectorError> {
        (**self).fetch(params)
    }
}
