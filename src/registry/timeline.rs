use std::collections::VecDeque;

use serde::Serialize;

use crate::job::{JobRecord, JobState};

/// Layout data a renderer may cache on an entry. Never read by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderMetrics {
    pub text_width: u32,
}

/// A job snapshot stamped with the logical clock tick it was recorded at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub job: JobRecord,
    pub clock: u64,
    #[serde(skip)]
    render_cache: Option<RenderMetrics>,
}

impl TimelineEntry {
    pub fn new(job: JobRecord, clock: u64) -> Self {
        Self {
            job,
            clock,
            render_cache: None,
        }
    }

    pub fn render_cache(&self) -> Option<RenderMetrics> {
        self.render_cache
    }

    pub fn attach_render_cache(&mut self, metrics: RenderMetrics) {
        self.render_cache = Some(metrics);
    }

    pub fn invalidate_render_cache(&mut self) {
        self.render_cache = None;
    }
}

/// Ordered, clock-bounded history of one slot.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: VecDeque<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless it repeats the job and state of the latest one.
    /// Returns whether the entry was stored.
    pub fn append(&mut self, entry: TimelineEntry) -> bool {
        if let Some(last) = self.entries.back() {
            if last.job.id == entry.job.id && last.job.state() == entry.job.state() {
                return false;
            }
        }
        self.entries.push_back(entry);
        true
    }

    /// Drop entries older than `now - window`, always keeping the newest one.
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: u64, window: u64) -> usize {
        let cutoff = now.saturating_sub(window);
        let mut removed = 0;
        while self.entries.len() > 1 {
            match self.entries.front() {
                Some(front) if front.clock < cutoff => {
                    self.entries.pop_front();
                    removed += 1;
                }
                _ => break,
            }
        }
        removed
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.back()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// No live job holds the lane.
    pub fn is_free(&self) -> bool {
        self.last()
            .map_or(true, |entry| !entry.job.state().occupies_slot())
    }

    /// The lane has never done real work: its whole history is the single
    /// idle placeholder.
    pub fn fully_idle(&self) -> bool {
        self.entries.len() == 1
            && self.entries[0].job.state() == JobState::Idle
            && self.is_free()
    }
}
