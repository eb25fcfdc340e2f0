use chrono::{DateTime, Utc};

use crate::config::DEFAULT_MAX_SLOTS_PER_NODE;
use crate::error::{MonitorError, Result};
use crate::feed::event::SchedulerEvent;
use crate::job::{JobId, JobRecord, JobStore};

/// What an event amounted to after being applied to the job store.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// A job record changed; carries the post-transition snapshot
    Job(JobRecord),
    /// Capacity/liveness report for a host, bypassing the job store
    NodeStats { host: String, max_kids: u32 },
    /// Nothing to do (unknown job, terminal job, store full)
    Ignored,
    StreamEnd,
}

/// Turns scheduler events into job record creations and transitions.
#[derive(Debug)]
pub struct EventIngestor {
    jobs: JobStore,
    max_slots_per_node: u32,
}

impl Default for EventIngestor {
    fn default() -> Self {
        Self {
            jobs: JobStore::new(),
            max_slots_per_node: DEFAULT_MAX_SLOTS_PER_NODE,
        }
    }
}

impl EventIngestor {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: JobStore::with_capacity(max_jobs),
            ..Self::default()
        }
    }

    /// Reject `NodeStats` reports above `max_slots` lanes.
    pub fn with_max_slots_per_node(mut self, max_slots: u32) -> Self {
        self.max_slots_per_node = max_slots;
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Forget live jobs whose lane went away with their host. The records leave
    /// the store and come back marked `Unknown`, so views can retire them.
    pub fn orphan(&mut self, job_ids: &[JobId]) -> Vec<JobRecord> {
        job_ids
            .iter()
            .filter_map(|id| self.jobs.remove(*id))
            .map(|mut job| {
                if !job.is_done() {
                    job.mark_unknown();
                }
                job
            })
            .collect()
    }

    /// Make room in a full store: terminal records go first, then live records
    /// for which `has_lane` is false. Evicted live records are returned marked
    /// `Unknown`.
    pub fn make_room<F>(&mut self, has_lane: F) -> Vec<JobRecord>
    where
        F: Fn(JobId) -> bool,
    {
        if !self.jobs.is_full() {
            return Vec::new();
        }
        self.jobs.evict_finished();
        if !self.jobs.is_full() {
            return Vec::new();
        }

        let mut evicted = self.jobs.evict_where(|job| !has_lane(job.id));
        for job in evicted.iter_mut() {
            job.mark_unknown();
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "Evicted jobs without a lane");
        }
        evicted
    }

    /// Apply one event.
    ///
    /// Events referring to a job that started before the monitor attached are
    /// expected and come back as `Ingested::Ignored`. Only events missing
    /// required content are reported as errors.
    pub fn ingest(&mut self, event: SchedulerEvent) -> Result<Ingested> {
        match event {
            SchedulerEvent::AssignCompileServer {
                job_id,
                client,
                file_name,
                version,
                language,
            } => {
                require_host("client", &client)?;
                let job = JobRecord::waiting(job_id, client, file_name, version, language);
                Ok(self.remember(job))
            }
            SchedulerEvent::LocalJobBegin {
                job_id,
                host,
                file_name,
            } => {
                require_host("host", &host)?;
                let job = JobRecord::local(job_id, host, file_name);
                Ok(self.remember(job))
            }
            SchedulerEvent::LocalJobDone { job_id, exit_code } => {
                self.transition(job_id, |job| job.finish_local(exit_code))
            }
            SchedulerEvent::JobBegin {
                job_id,
                host,
                start_time,
            } => {
                require_host("host", &host)?;
                let start_time = start_time.map(parse_start_time).transpose()?;
                self.transition(job_id, |job| job.begin(host, start_time))
            }
            SchedulerEvent::JobDone {
                job_id,
                exit_code,
                outcome,
            } => self.transition(job_id, |job| job.finish(exit_code, outcome)),
            SchedulerEvent::NodeStats { host, max_kids } => {
                require_host("host", &host)?;
                require_capacity(max_kids, self.max_slots_per_node)?;
                Ok(Ingested::NodeStats { host, max_kids })
            }
            SchedulerEvent::StreamEnd => Ok(Ingested::StreamEnd),
        }
    }

    fn remember(&mut self, job: JobRecord) -> Ingested {
        let job_id = job.id;
        if self.jobs.insert(job.clone()) {
            tracing::debug!(job_id, host = job.host(), state = %job.state(), "Job recorded");
            Ingested::Job(job)
        } else {
            tracing::warn!(job_id, "Job store at capacity, job dropped");
            Ingested::Ignored
        }
    }

    fn transition<F>(&mut self, job_id: JobId, apply: F) -> Result<Ingested>
    where
        F: FnOnce(&mut JobRecord) -> Result<()>,
    {
        let Some(job) = self.jobs.get_mut(job_id) else {
            // Started before we attached
            tracing::trace!(job_id, "Event for unknown job dropped");
            return Ok(Ingested::Ignored);
        };

        match apply(job) {
            Ok(()) => {
                tracing::debug!(job_id, host = job.host(), state = %job.state(), "Job updated");
                Ok(Ingested::Job(job.clone()))
            }
            Err(MonitorError::TerminalJob(_)) => {
                tracing::debug!(job_id, state = %job.state(), "Event for finished job dropped");
                Ok(Ingested::Ignored)
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn require_host(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MonitorError::MalformedEvent(format!("empty {}", field)));
    }
    Ok(())
}

/// Capacity reports above `limit` lanes are treated as malformed.
pub(crate) fn require_capacity(max_kids: u32, limit: u32) -> Result<()> {
    if max_kids > limit {
        return Err(MonitorError::MalformedEvent(format!(
            "max_kids {} exceeds limit {}",
            max_kids, limit
        )));
    }
    Ok(())
}

fn parse_start_time(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MonitorError::MalformedEvent(format!("start time out of range: {}", secs)))
}
