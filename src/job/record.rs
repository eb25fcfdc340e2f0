use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Scheduler-assigned job identifier, unique for the lifetime of the scheduler.
pub type JobId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    WaitingForCs,
    Compiling,
    Finished,
    Failed,
    Idle,
    LocalOnly,
    Unknown,
}

impl JobState {
    /// `Finished` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }

    /// Whether a job in this state keeps its slot busy.
    pub fn occupies_slot(self) -> bool {
        matches!(
            self,
            JobState::WaitingForCs | JobState::Compiling | JobState::LocalOnly
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::WaitingForCs => write!(f, "Waiting"),
            JobState::Compiling => write!(f, "Compiling"),
            JobState::Finished => write!(f, "Finished"),
            JobState::Failed => write!(f, "Failed"),
            JobState::Idle => write!(f, "Idle"),
            JobState::LocalOnly => write!(f, "LocalOnly"),
            JobState::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "C")]
    C,
    #[default]
    #[serde(rename = "C++", alias = "cxx")]
    Cxx,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::C => write!(f, "C"),
            Language::Cxx => write!(f, "C++"),
        }
    }
}

/// Resource usage reported by the compile server for a successful job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOutcome {
    /// Wall clock time
    pub real_msec: u64,
    pub user_msec: u64,
    pub sys_msec: u64,
    /// Maximum resident set size (KB)
    pub maxrss: u64,
    /// Integral unshared data size (KB)
    pub idrss: u64,
    /// Major page faults
    pub majflt: u64,
    pub nswap: u64,
    pub in_compressed: u64,
    pub in_uncompressed: u64,
    pub out_compressed: u64,
    pub out_uncompressed: u64,
}

/// One compilation job as seen by the monitor.
///
/// A record is created on first sighting and then mutated in place through the
/// transition methods below. Timeline entries hold clones, so later mutations
/// never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub client: String,
    pub server: Option<String>,
    pub file_name: String,
    pub version: String,
    pub language: Language,
    pub start_time: Option<DateTime<Utc>>,
    state: JobState,
    exit_code: Option<i32>,
    outcome: Option<JobOutcome>,
}

impl JobRecord {
    /// A remote job that has asked the scheduler for a compile server.
    pub fn waiting(
        id: JobId,
        client: String,
        file_name: String,
        version: String,
        language: Language,
    ) -> Self {
        Self {
            id,
            client,
            server: None,
            file_name,
            version,
            language,
            start_time: None,
            state: JobState::WaitingForCs,
            exit_code: None,
            outcome: None,
        }
    }

    /// A job compiled on the submitting host itself.
    pub fn local(id: JobId, host: String, file_name: String) -> Self {
        Self {
            id,
            server: Some(host.clone()),
            client: host,
            file_name,
            version: String::new(),
            language: Language::Cxx,
            start_time: None,
            state: JobState::LocalOnly,
            exit_code: None,
            outcome: None,
        }
    }

    /// Placeholder occupying a freshly created, never used slot.
    ///
    /// Placeholders are told apart by their `Idle` state, never by id: real
    /// jobs are never idle, so the id carries no meaning here.
    pub fn idle_placeholder() -> Self {
        Self {
            id: 0,
            client: String::new(),
            server: None,
            file_name: String::new(),
            version: String::new(),
            language: Language::default(),
            start_time: None,
            state: JobState::Idle,
            exit_code: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Outcome metrics; only present after a `Finished` transition with exit code 0.
    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_placeholder(&self) -> bool {
        self.state == JobState::Idle
    }

    /// Host whose lane shows this job: the server once compilation started,
    /// the client while waiting or running locally.
    pub fn host(&self) -> &str {
        match self.state {
            JobState::Compiling | JobState::Finished | JobState::Failed => {
                self.server.as_deref().unwrap_or(&self.client)
            }
            _ => &self.client,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(MonitorError::TerminalJob(self.id));
        }
        Ok(())
    }

    /// The job started compiling on `server`.
    pub fn begin(&mut self, server: String, start_time: Option<DateTime<Utc>>) -> Result<()> {
        self.ensure_live()?;
        self.server = Some(server);
        self.start_time = start_time;
        self.state = JobState::Compiling;
        Ok(())
    }

    /// The remote compile finished. A non-zero exit code fails the job and
    /// discards the reported metrics.
    pub fn finish(&mut self, exit_code: i32, outcome: JobOutcome) -> Result<()> {
        self.ensure_live()?;
        self.exit_code = Some(exit_code);
        if exit_code != 0 {
            self.state = JobState::Failed;
        } else {
            self.state = JobState::Finished;
            self.outcome = Some(outcome);
        }
        Ok(())
    }

    /// The job's lane disappeared with its host; nothing more will be
    /// tracked for it.
    pub(crate) fn mark_unknown(&mut self) {
        self.state = JobState::Unknown;
    }

    /// A local job finished. Local jobs are always shown as finished; the exit
    /// code is kept for inspection.
    pub fn finish_local(&mut self, exit_code: i32) -> Result<()> {
        self.ensure_live()?;
        self.exit_code = Some(exit_code);
        self.state = JobState::Finished;
        Ok(())
    }
}
