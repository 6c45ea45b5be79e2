use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to database at {target:?}")]
    Connection {
        target: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("schema operation `{operation}` failed")]
    Schema {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// Only surfaced when saving without replace semantics, otherwise resolved into an update.
    #[error("job report {job_id} already exists")]
    Conflict { job_id: String },
    #[error("could not persist job report {job_id}")]
    Persistence {
        job_id: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("committing pending job reports failed")]
    Commit(#[source] rusqlite::Error),
    #[error("query failed")]
    Query(#[source] rusqlite::Error),
    #[error("{0} is not supported yet")]
    NotImplemented(&'static str),
}

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("cannot determine the last loaded start time")]
    Unresolvable(#[source] rusqlite::Error),
    #[error("no watermark: the job report table is empty, load a bounded range first")]
    Absent,
}
