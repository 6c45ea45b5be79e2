use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// One row of `sacct` output: a job, or one of its steps (`12345.batch`), each with its own `JobID`.
///
/// Serialized names are the column names of the `jobreport` table. Anything the collector saw
/// that has no column goes into [`AccountingRecord::extra`] and is never persisted.
#[derive(Debug, Clone, PartialEq, Default, Builder, Serialize, Deserialize)]
#[builder(default, setter(into, strip_option))]
pub struct AccountingRecord {
    #[serde(rename = "JobID")]
    pub job_id: String,
    #[serde(rename = "User")]
    pub user: Option<String>,
    #[serde(rename = "JobName")]
    pub job_name: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Partition")]
    pub partition: Option<String>,
    #[serde(rename = "NCPUS")]
    pub ncpus: Option<i64>,
    #[serde(rename = "NNodes")]
    pub nnodes: Option<i64>,
    #[serde(rename = "CPUTime")]
    pub cpu_time: Option<f64>,
    #[serde(rename = "TotalCPU")]
    pub total_cpu: Option<f64>,
    #[serde(rename = "UserCPU")]
    pub user_cpu: Option<f64>,
    #[serde(rename = "SystemCPU")]
    pub system_cpu: Option<f64>,
    #[serde(rename = "MaxRSS_kB")]
    pub max_rss_kb: Option<i64>,
    #[serde(rename = "ReqMem_bytes_per_node")]
    pub req_mem_bytes_per_node: Option<i64>,
    #[serde(rename = "ReqMem_bytes_per_core")]
    pub req_mem_bytes_per_core: Option<i64>,
    #[serde(rename = "ReqMem_bytes")]
    pub req_mem_bytes: Option<i64>,
    #[serde(rename = "Start")]
    pub start: Option<NaiveDateTime>,
    #[serde(rename = "End")]
    pub end: Option<NaiveDateTime>,
    #[serde(rename = "NodeList")]
    pub node_list: Option<String>,
    #[serde(rename = "ReqMem_bytes_total")]
    pub req_mem_bytes_total: Option<i64>,
    #[serde(rename = "CPU_Efficiency")]
    pub cpu_efficiency: Option<f64>,
    #[serde(rename = "CPU_Wasted")]
    pub cpu_wasted: Option<f64>,
    #[serde(rename = "CancelledBy")]
    pub cancelled_by: Option<String>,

    #[serde(flatten)]
    #[builder(setter(custom))]
    pub extra: BTreeMap<String, String>,
}

impl AccountingRecordBuilder {
    /// Attach a field that has no column (raw `ReqMem`, `Elapsed`, ...).
    pub fn extra(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.extra.get_or_insert_with(BTreeMap::new).insert(name.into(), value.into());
        self
    }
}
