//! Presentation-side capability interface.
//!
//! A renderer implements [`StatusView`] and is attached to the monitor; it is
//! told about every job transition and every manual node check. Views are
//! observers only: they get job snapshots by reference and can never reach
//! the registry.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::job::store::DEFAULT_MAX_JOBS;
use crate::job::{JobId, JobRecord};

pub trait StatusView: Send {
    fn on_update(&mut self, job: &JobRecord);

    fn on_check_node(&mut self, _host: &str, _max_kids: u32) {}
}

/// Latest record of every job seen, keyed by id. Cheap to clone; all clones
/// share the same table.
///
/// Holds at most `max_rows` jobs. When full, finished rows make way for new
/// ones; if every row is still live the new job is not shown.
#[derive(Debug, Clone)]
pub struct JobTable {
    rows: Arc<RwLock<BTreeMap<JobId, JobRecord>>>,
    max_rows: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_rows: usize) -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            max_rows,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_rows
    }

    pub fn rows(&self) -> Vec<JobRecord> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.values().cloned().collect()
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatusView for JobTable {
    fn on_update(&mut self, job: &JobRecord) {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        if !rows.contains_key(&job.id) && rows.len() >= self.max_rows {
            let before = rows.len();
            rows.retain(|_, row| row.state().occupies_slot());
            tracing::debug!(evicted = before - rows.len(), "Job table full, evicted finished rows");
            if rows.len() >= self.max_rows {
                tracing::warn!(job_id = job.id, "Job table full, row dropped");
                return;
            }
        }
        rows.insert(job.id, job.clone());
    }
}

/// Writes every transition to the log.
#[derive(Debug, Default)]
pub struct LogView;

impl StatusView for LogView {
    fn on_update(&mut self, job: &JobRecord) {
        tracing::info!(
            job_id = job.id,
            file = %job.file_name,
            client = %job.client,
            server = job.server.as_deref().unwrap_or("-"),
            state = %job.state(),
            exit_code = ?job.exit_code(),
            "Job"
        );
    }

    fn on_check_node(&mut self, host: &str, max_kids: u32) {
        tracing::info!(host, max_kids, "Node check requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: JobId) -> JobRecord {
        JobRecord::local(id, "alpha".to_string(), format!("{}.c", id))
    }

    fn finished(id: JobId) -> JobRecord {
        let mut job = local(id);
        job.finish_local(0).unwrap();
        job
    }

    #[test]
    fn table_updates_rows_in_place() {
        let mut table = JobTable::with_capacity(1);
        table.on_update(&local(1));
        table.on_update(&finished(1));

        assert_eq!(table.len(), 1);
        assert!(table.get(1).unwrap().is_done());
    }

    #[test]
    fn full_table_evicts_finished_rows_first() {
        let mut table = JobTable::with_capacity(3);
        table.on_update(&finished(1));
        table.on_update(&local(2));
        table.on_update(&finished(3));

        table.on_update(&local(4));

        assert_eq!(table.len(), 2);
        assert!(table.get(1).is_none());
        assert!(table.get(3).is_none());
        assert!(table.get(2).is_some());
        assert!(table.get(4).is_some());
    }

    #[test]
    fn full_table_of_live_rows_drops_new_job() {
        let mut table = JobTable::with_capacity(2);
        for id in 1..=1000 {
            table.on_update(&local(id));
        }

        assert_eq!(table.len(), table.capacity());
        assert!(table.get(1).is_some());
        assert!(table.get(1000).is_none());

        // Updates to rows already shown still land
        table.on_update(&finished(2));
        assert!(table.get(2).unwrap().is_done());
    }
}
