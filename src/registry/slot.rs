use serde::Serialize;

use crate::job::JobRecord;
use crate::registry::timeline::{Timeline, TimelineEntry};

/// Stable handle of a slot; never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub u64);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One lane of concurrent compile capacity on a host.
#[derive(Debug, Clone)]
pub struct Slot {
    id: SlotId,
    timeline: Timeline,
    last_update: u64,
}

impl Slot {
    /// A new lane holding just the idle placeholder.
    pub fn placeholder(id: SlotId, clock: u64) -> Self {
        let mut timeline = Timeline::new();
        timeline.append(TimelineEntry::new(JobRecord::idle_placeholder(), clock));
        Self {
            id,
            timeline,
            last_update: clock,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Clock tick of the latest recorded job change
    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    pub fn is_free(&self) -> bool {
        self.timeline.is_free()
    }

    pub fn fully_idle(&self) -> bool {
        self.timeline.fully_idle()
    }

    /// The job currently holding this lane, if any.
    pub fn current_job(&self) -> Option<&JobRecord> {
        self.timeline
            .last()
            .map(|entry| &entry.job)
            .filter(|job| job.state().occupies_slot())
    }

    /// Append a job change. A repeat of the current entry is not stored and
    /// leaves `last_update` alone.
    pub fn record(&mut self, job: JobRecord, clock: u64) -> bool {
        let stored = self.timeline.append(TimelineEntry::new(job, clock));
        if stored {
            self.last_update = clock;
        }
        stored
    }

    pub fn prune(&mut self, now: u64, window: u64) -> usize {
        self.timeline.prune(now, window)
    }
}
