use std::process::Command;

use color_eyre::{
    eyre::{ensure, eyre, WrapErr as _},
    Result,
};
use itertools::Itertools as _;
use tracing::{debug, instrument, warn};

use crate::{
    collector::{Collector, CollectorError},
    filter::FilterParams,
    misc::parsing::{
        interval::parse_interval_secs,
        memory::{parse_memory, MemoryScope},
    },
    record::AccountingRecord,
    slurm::parse_slurm_datetime,
};

/// Field order requested from `sacct` and expected by [`parse_sacct_output`].
pub const SACCT_FORMAT: [&str; 16] = [
    "JobID", "User", "JobName", "State", "Partition", "NCPUS", "NNodes", "CPUTime", "TotalCPU", "UserCPU",
    "SystemCPU", "ReqMem", "MaxRSS", "Start", "End", "NodeList",
];

/// Diagnostics on a failed `sacct` run that only mean "try again later" (slurmdbd busy, etc.).
pub const DEFAULT_TRANSIENT_DIAGNOSTICS: &[&str] = &["Socket timed out on send/recv operation"];

/// [`Collector`] running `sacct --parsable2` on the local machine.
#[derive(Debug, Clone)]
pub struct Sacct {
    program: String,
    transient_diagnostics: Vec<String>,
}

impl Default for Sacct {
    fn default() -> Self {
        Self::new("sacct")
    }
}

impl Sacct {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            transient_diagnostics: DEFAULT_TRANSIENT_DIAGNOSTICS.iter().map(|&d| d.to_owned()).collect(),
        }
    }

    pub fn with_transient_diagnostics<S: Into<String>>(mut self, diagnostics: impl IntoIterator<Item = S>) -> Self {
        self.transient_diagnostics = diagnostics.into_iter().map(Into::into).collect();
        self
    }

    pub fn command_args(params: &FilterParams) -> Vec<String> {
        [
            "--noheader".to_owned(),
            "--parsable2".to_owned(), // sep by `|` without trailing `|`
            format!("--format={}", SACCT_FORMAT.join(",")),
        ]
        .into_iter()
        .chain(params.to_args())
        .collect()
    }
}

impl Collector for Sacct {
    #[instrument(skip(self), fields(program = %self.program))]
    fn fetch(&mut self, params: &FilterParams) -> Result<Vec<AccountingRecord>, CollectorError> {
        let args = Self::command_args(params);
        debug!(?args, "querying accounting records");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| CollectorError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            if let Some(diagnostic) = self.transient_diagnostics.iter().find(|d| stderr.contains(d.as_str())) {
                return Err(CollectorError::Transient {
                    program: self.program.clone(),
                    diagnostic: diagnostic.clone(),
                });
            }
            return Err(CollectorError::Command {
                program: self.program.clone(),
                status: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            warn!(%stderr, "sacct succeeded but wrote to stderr");
        }

        parse_sacct_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses `--noheader --parsable2` output in [`SACCT_FORMAT`] order. Blank lines are skipped,
/// line numbers in errors are 1-based.
pub fn parse_sacct_output(text: &str) -> Result<Vec<AccountingRecord>, CollectorError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_sacct_line(line).map_err(|e| CollectorError::Parse {
                line: i + 1,
                reason: format!("{e:#}"),
            })
        })
        .collect()
}

/// `--parsable2` does not escape `|`, so `JobName` takes whatever lies between the two leading
/// and the thirteen trailing fields.
fn parse_sacct_line(line: &str) -> Result<AccountingRecord> {
    let field_count_error = || eyre!("expected {} `|`-separated fields, got {}", SACCT_FORMAT.len(), line.split('|').count());
    let (job_id, user, rest) = line.splitn(3, '|').collect_tuple().ok_or_else(field_count_error)?;
    let mut tail = rest.rsplitn(SACCT_FORMAT.len() - 2, '|').collect_vec();
    tail.reverse();
    let &[job_name, state, partition, ncpus, nnodes, cpu_time, total_cpu, user_cpu, system_cpu, req_mem, max_rss, start, end, node_list] =
        tail.as_slice()
    else {
        return Err(field_count_error());
    };
    ensure!(!job_id.trim().is_empty(), "empty JobID");

    let ncpus = optional(ncpus, |s| s.parse::<i64>().wrap_err("NCPUS"))?;
    let nnodes = optional(nnodes, |s| s.parse::<i64>().wrap_err("NNodes"))?;
    let cpu_time = optional(cpu_time, |s| parse_interval_secs(s).wrap_err("CPUTime"))?;
    let total_cpu = optional(total_cpu, |s| parse_interval_secs(s).wrap_err("TotalCPU"))?;
    let user_cpu = optional(user_cpu, |s| parse_interval_secs(s).wrap_err("UserCPU"))?;
    let system_cpu = optional(system_cpu, |s| parse_interval_secs(s).wrap_err("SystemCPU"))?;
    let req_mem_parsed = optional(req_mem, |s| parse_memory(s).wrap_err("ReqMem"))?;
    let max_rss = optional(max_rss, |s| parse_memory(s).wrap_err("MaxRSS"))?;

    // `CANCELLED by 12345`
    let (state, cancelled_by) = match state.split_once(" by ") {
        Some((state, by)) => (state, text(by)),
        None => (state, None),
    };

    let (cpu_efficiency, cpu_wasted) = match (cpu_time, total_cpu) {
        (Some(cpu), Some(total)) if cpu > 0.0 => (Some(total / cpu), Some(cpu - total)),
        (Some(cpu), Some(total)) => (None, Some(cpu - total)),
        _ => (None, None),
    };

    let mut record = AccountingRecord {
        job_id: job_id.trim().to_owned(),
        user: text(user),
        job_name: text(job_name),
        state: text(state),
        partition: text(partition),
        ncpus,
        nnodes,
        cpu_time,
        total_cpu,
        user_cpu,
        system_cpu,
        max_rss_kb: max_rss.map(|m| m.kilobytes()),
        start: parse_slurm_datetime(start).wrap_err("Start")?,
        end: parse_slurm_datetime(end).wrap_err("End")?,
        node_list: text(node_list),
        cancelled_by,
        cpu_efficiency,
        cpu_wasted,
        ..Default::default()
    };

    if let Some(mem) = req_mem_parsed {
        record.req_mem_bytes = Some(mem.bytes);
        match mem.scope {
            MemoryScope::PerNode => {
                record.req_mem_bytes_per_node = Some(mem.bytes);
                record.req_mem_bytes_total = nnodes.map(|n| total_req_mem(n, mem.bytes)).transpose()?;
            }
            MemoryScope::PerCore => {
                record.req_mem_bytes_per_core = Some(mem.bytes);
                record.req_mem_bytes_total = ncpus.map(|n| total_req_mem(n, mem.bytes)).transpose()?;
            }
            MemoryScope::Total => record.req_mem_bytes_total = Some(mem.bytes),
        }
        record.extra.insert("ReqMem".to_owned(), req_mem.to_owned());
    }

    Ok(record)
}

fn total_req_mem(count: i64, bytes: i64) -> Result<i64> {
    count
        .checked_mul(bytes)
        .ok_or_else(|| eyre!("ReqMem: {count} x {bytes} bytes overflows"))
}

fn text(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_owned())
}

fn optional<T>(field: &str, parse: impl FnOnce(&str) -> Result<T>) -> Result<Option<T>> {
    match field.trim() {
        "" => Ok(None),
        field => parse(field).map(Some),
    }
}
