use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobOutcome, Language};

/// Typed message delivered by the scheduler feed, in emission order.
///
/// On the wire each event is one JSON object tagged by `type`, e.g.
/// `{"type":"job_begin","job_id":4,"host":"alpha","start_time":1700000000}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A client asked for a compile server
    AssignCompileServer {
        job_id: JobId,
        client: String,
        file_name: String,
        #[serde(default)]
        version: String,
        #[serde(default)]
        language: Language,
    },
    LocalJobBegin {
        job_id: JobId,
        host: String,
        #[serde(default)]
        file_name: String,
    },
    LocalJobDone {
        job_id: JobId,
        exit_code: i32,
    },
    JobBegin {
        job_id: JobId,
        host: String,
        /// Start time in seconds since the Unix epoch
        #[serde(default)]
        start_time: Option<i64>,
    },
    JobDone {
        job_id: JobId,
        exit_code: i32,
        #[serde(flatten)]
        outcome: JobOutcome,
    },
    /// Periodic host report; `max_kids` is the host's concurrent job capacity
    NodeStats {
        host: String,
        max_kids: u32,
    },
    StreamEnd,
}

impl SchedulerEvent {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            SchedulerEvent::AssignCompileServer { job_id, .. }
            | SchedulerEvent::LocalJobBegin { job_id, .. }
            | SchedulerEvent::LocalJobDone { job_id, .. }
            | SchedulerEvent::JobBegin { job_id, .. }
            | SchedulerEvent::JobDone { job_id, .. } => Some(*job_id),
            SchedulerEvent::NodeStats { .. } | SchedulerEvent::StreamEnd => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::AssignCompileServer { .. } => "assign_compile_server",
            SchedulerEvent::LocalJobBegin { .. } => "local_job_begin",
            SchedulerEvent::LocalJobDone { .. } => "local_job_done",
            SchedulerEvent::JobBegin { .. } => "job_begin",
            SchedulerEvent::JobDone { .. } => "job_done",
            SchedulerEvent::NodeStats { .. } => "node_stats",
            SchedulerEvent::StreamEnd => "stream_end",
        }
    }
}
