use serde::Serialize;

use crate::registry::node::{Color, NodeId};
use crate::registry::slot::SlotId;
use crate::registry::timeline::TimelineEntry;

#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub is_free: bool,
    pub fully_idle: bool,
    pub last_update: u64,
    pub entries: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub host: String,
    pub color: Color,
    pub capacity: u32,
    pub capacity_reported: bool,
    pub last_seen_age: u32,
    pub slots: Vec<SlotSnapshot>,
}

impl NodeSnapshot {
    pub fn busy_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free).count()
    }
}

/// Immutable copy of the registry handed to presentation layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub clock: u64,
    pub window_ticks: u64,
    pub dropped_updates: u64,
    pub nodes: Vec<NodeSnapshot>,
}

impl RegistrySnapshot {
    pub fn node(&self, host: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.host == host)
    }
}
