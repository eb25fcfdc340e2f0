use std::collections::BTreeMap;

use crate::job::record::{JobId, JobRecord};

pub(crate) const DEFAULT_MAX_JOBS: usize = 10_000;

/// Remembered job records, keyed and ordered by job id.
///
/// Records stay here after they reach a terminal state so newly attached views
/// can be replayed. When the store is full, terminal records are evicted first.
#[derive(Debug)]
pub struct JobStore {
    jobs: BTreeMap<JobId, JobRecord>,
    max_jobs: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: BTreeMap::new(),
            max_jobs,
        }
    }

    /// Insert or overwrite a record. Returns false if the store is full of live
    /// jobs and the record could not be taken.
    pub fn insert(&mut self, job: JobRecord) -> bool {
        if !self.jobs.contains_key(&job.id) && self.is_full() {
            let evicted = self.evict_finished();
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted finished jobs from store");
            }
            if self.is_full() {
                return false;
            }
        }
        self.jobs.insert(job.id, job);
        true
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&id)
    }

    /// All remembered jobs in id order
    pub fn all_jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn remove(&mut self, id: JobId) -> Option<JobRecord> {
        self.jobs.remove(&id)
    }

    /// Remove every record matching `evict`, returning them in id order.
    pub fn evict_where<F>(&mut self, mut evict: F) -> Vec<JobRecord>
    where
        F: FnMut(&JobRecord) -> bool,
    {
        let ids: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| evict(job))
            .map(|job| job.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.jobs.remove(&id))
            .collect()
    }

    /// Drop every terminal record. Returns the number removed.
    pub fn evict_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.is_done());
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }
}
