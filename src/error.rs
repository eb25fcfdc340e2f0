use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Job {0} is already in a terminal state")]
    TerminalJob(JobId),

    #[error("Monitor is no longer running")]
    MonitorClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
