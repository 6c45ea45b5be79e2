use std::{collections::BTreeMap, ops::Range};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::slurm::format_datetime_for_slurm;

pub const STARTTIME: &str = "starttime";
pub const ENDTIME: &str = "endtime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Value(String),
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("can't parse filter parameter `{0}` (expected `key=value` or `flag`)")]
    Malformed(String),
}

/// Filter parameters forwarded verbatim to the collector, e.g. `state`, `starttime`, `user`.
/// Names are not validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams(BTreeMap<String, FilterValue>);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key=value` and bare `flag` pieces separated by `delimiter`. Empty pieces are skipped.
    pub fn parse(input: &str, delimiter: &str) -> Result<Self, FilterParseError> {
        let mut params = Self::new();
        for piece in input.split(delimiter).map(str::trim).filter(|piece| !piece.is_empty()) {
            match piece.split('=').collect::<Vec<_>>().as_slice() {
                &[key, value] if !key.is_empty() => params.set(key, value),
                &[flag] => params.set_flag(flag),
                _ => return Err(FilterParseError::Malformed(piece.to_owned())),
            };
        }
        Ok(params)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), FilterValue::Value(value.into()));
        self
    }

    pub fn set_flag(&mut self, name: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), FilterValue::Flag);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FilterValue::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of `self` restricted to `[window.start, window.end)`. Overrides any caller-supplied
    /// `starttime`/`endtime`.
    pub fn with_window(&self, window: &Range<NaiveDateTime>) -> Self {
        let mut params = self.clone();
        params
            .set(STARTTIME, format_datetime_for_slurm(window.start))
            .set(ENDTIME, format_datetime_for_slurm(window.end));
        params
    }

    /// Command line form: `--name=value` or `--flag`.
    pub fn to_args(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, value)| match value {
                FilterValue::Value(value) => format!("--{name}={value}"),
                FilterValue::Flag => format!("--{name}"),
            })
            .collect()
    }
}
