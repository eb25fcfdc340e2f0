use std::collections::{BTreeMap, HashMap};

use crate::config::DEFAULT_MAX_SLOTS_PER_NODE;
use crate::job::{JobId, JobRecord};
use crate::registry::node::{color_for_host, Color, Node, NodeId};
use crate::registry::slot::{Slot, SlotId};
use crate::registry::snapshot::{NodeSnapshot, RegistrySnapshot, SlotSnapshot};

/// Where a job update ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The job already had a lane and the update was routed there
    Routed { node: NodeId, slot: SlotId },
    /// The job took an existing free lane
    Reused { node: NodeId, slot: SlotId },
    /// A new lane was appended for the job
    Created { node: NodeId, slot: SlotId },
    /// A terminal update for a job that holds no lane
    Untracked,
    /// The host is saturated; the update was counted and discarded
    Dropped,
}

impl Placement {
    pub fn slot(&self) -> Option<(NodeId, SlotId)> {
        match *self {
            Placement::Routed { node, slot }
            | Placement::Reused { node, slot }
            | Placement::Created { node, slot } => Some((node, slot)),
            Placement::Untracked | Placement::Dropped => None,
        }
    }
}

/// A host dropped from the registry, with the live jobs that lost their lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    pub host: String,
    pub orphaned_jobs: Vec<JobId>,
}

/// Owns every node, its lanes and their timelines.
///
/// All mutation goes through `&mut self`; the monitor actor is the only
/// writer. Readers get a [`RegistrySnapshot`].
#[derive(Debug)]
pub struct SlotRegistry {
    nodes: BTreeMap<NodeId, Node>,
    hosts: HashMap<String, NodeId>,
    colors: HashMap<String, Color>,
    job_index: HashMap<JobId, (NodeId, SlotId)>,
    clock: u64,
    window_ticks: u64,
    next_node_id: u32,
    next_slot_id: u64,
    dropped_updates: u64,
    max_slots_per_node: u32,
}

impl SlotRegistry {
    pub fn new(window_ticks: u64) -> Self {
        Self {
            nodes: BTreeMap::new(),
            hosts: HashMap::new(),
            colors: HashMap::new(),
            job_index: HashMap::new(),
            clock: 0,
            window_ticks,
            next_node_id: 1,
            next_slot_id: 1,
            dropped_updates: 0,
            max_slots_per_node: DEFAULT_MAX_SLOTS_PER_NODE,
        }
    }

    /// Cap on lanes per host, for reported and inferred capacity alike.
    pub fn with_max_slots_per_node(mut self, max_slots: u32) -> Self {
        self.max_slots_per_node = max_slots;
        self
    }

    pub fn max_slots_per_node(&self) -> u32 {
        self.max_slots_per_node
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn window_ticks(&self) -> u64 {
        self.window_ticks
    }

    /// Number of job updates discarded because a host had no lane left
    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates
    }

    pub fn node_id(&self, host: &str) -> Option<NodeId> {
        self.hosts.get(host).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_host(&self, host: &str) -> Option<&Node> {
        self.node_id(host).and_then(|id| self.nodes.get(&id))
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lane currently held by a live job
    pub fn slot_of(&self, job_id: JobId) -> Option<(NodeId, SlotId)> {
        self.job_index.get(&job_id).copied()
    }

    pub fn indexed_jobs(&self) -> usize {
        self.job_index.len()
    }

    /// Color of a host, assigned on first sight and kept after the node is gone.
    pub fn color_of(&self, host: &str) -> Option<Color> {
        self.colors.get(host).copied()
    }

    fn ensure_node(&mut self, host: &str) -> NodeId {
        if let Some(id) = self.hosts.get(host) {
            return *id;
        }

        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        let color = *self
            .colors
            .entry(host.to_string())
            .or_insert_with(|| color_for_host(host));
        self.nodes
            .insert(id, Node::new(id, host.to_string(), color));
        self.hosts.insert(host.to_string(), id);
        tracing::info!(host, node_id = %id, color = %color, "Node registered");
        id
    }

    /// Route a job snapshot to its lane, assigning one if needed.
    pub fn on_job_update(&mut self, job: &JobRecord) -> Placement {
        let host = job.host();

        if let Some((node_id, slot_id)) = self.slot_of(job.id) {
            if self.node_id(host) == Some(node_id) {
                return self.route(job, node_id, slot_id);
            }
            self.release(job.id, node_id, slot_id);
        }

        if job.is_done() {
            tracing::trace!(job_id = job.id, host, "Finished job without a lane ignored");
            return Placement::Untracked;
        }

        let node_id = self.ensure_node(host);
        let clock = self.clock;
        let max_slots = self.max_slots_per_node as usize;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return Placement::Untracked;
        };
        node.touch();

        let placement = if let Some(slot_id) = node.free_slot_for_new_job() {
            Placement::Reused {
                node: node_id,
                slot: slot_id,
            }
        } else if node.slots.len() < node.capacity() as usize
            || (!node.capacity_reported() && node.slots.len() < max_slots)
        {
            if node.slots.len() >= node.capacity() as usize {
                node.infer_capacity(node.slots.len() as u32 + 1);
            }
            let slot_id = SlotId(self.next_slot_id);
            self.next_slot_id += 1;
            node.slots.push(Slot::placeholder(slot_id, clock));
            Placement::Created {
                node: node_id,
                slot: slot_id,
            }
        } else {
            self.dropped_updates += 1;
            tracing::warn!(
                job_id = job.id,
                host,
                capacity = node.capacity(),
                dropped = self.dropped_updates,
                "No free slot, update dropped"
            );
            return Placement::Dropped;
        };

        if let Some((_, slot_id)) = placement.slot() {
            if let Some(slot) = node.slot_mut(slot_id) {
                slot.record(job.clone(), clock);
            }
            self.job_index.insert(job.id, (node_id, slot_id));
            tracing::debug!(job_id = job.id, host, slot = %slot_id, ?placement, "Job assigned to slot");
        }
        placement
    }

    fn route(&mut self, job: &JobRecord, node_id: NodeId, slot_id: SlotId) -> Placement {
        let clock = self.clock;
        let mut removed = Vec::new();
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.touch();
            if let Some(slot) = node.slot_mut(slot_id) {
                slot.record(job.clone(), clock);
            }
            if job.is_done() {
                removed = node.trim_excess();
            }
        }
        if job.is_done() {
            self.job_index.remove(&job.id);
        }
        self.forget_slots(&removed);
        Placement::Routed {
            node: node_id,
            slot: slot_id,
        }
    }

    /// Free the lane a job is leaving because it moved to another host.
    fn release(&mut self, job_id: JobId, node_id: NodeId, slot_id: SlotId) {
        let clock = self.clock;
        self.job_index.remove(&job_id);
        let mut removed = Vec::new();
        if let Some(node) = self.nodes.get_mut(&node_id) {
            if let Some(slot) = node.slot_mut(slot_id) {
                slot.record(JobRecord::idle_placeholder(), clock);
            }
            removed = node.trim_excess();
            tracing::debug!(job_id, host = node.host(), slot = %slot_id, "Job left slot for another host");
        }
        self.forget_slots(&removed);
    }

    fn forget_slots(&mut self, removed: &[SlotId]) {
        if removed.is_empty() {
            return;
        }
        self.job_index
            .retain(|_, (_, slot_id)| !removed.contains(slot_id));
    }

    /// Capacity and liveness report for a host.
    ///
    /// Grows the lane list up to `capacity` with idle lanes; when capacity
    /// shrinks, free lanes are removed from the end. Occupied lanes stay until
    /// their job finishes.
    pub fn on_node_stats(&mut self, host: &str, capacity: u32) {
        let capacity = if capacity > self.max_slots_per_node {
            tracing::warn!(
                host,
                capacity,
                limit = self.max_slots_per_node,
                "Reported capacity above limit, clamped"
            );
            self.max_slots_per_node
        } else {
            capacity
        };
        let node_id = self.ensure_node(host);
        let clock = self.clock;
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        node.touch();

        let previous = node.capacity();
        node.set_reported_capacity(capacity);
        while node.slots.len() < capacity as usize {
            let slot_id = SlotId(self.next_slot_id);
            self.next_slot_id += 1;
            node.slots.push(Slot::placeholder(slot_id, clock));
        }
        let removed = node.trim_excess();
        if previous != capacity || !removed.is_empty() {
            tracing::debug!(
                host,
                previous,
                capacity,
                slots = node.slots.len(),
                removed = removed.len(),
                "Node capacity updated"
            );
        }
        self.forget_slots(&removed);
    }

    /// Discard a host with all its lanes and index entries. Returns `None` if
    /// the host was unknown.
    pub fn remove_node(&mut self, host: &str) -> Option<RemovedNode> {
        let node_id = self.hosts.remove(host)?;
        self.nodes.remove(&node_id);

        let mut orphaned_jobs = Vec::new();
        self.job_index.retain(|job_id, (owner, _)| {
            if *owner == node_id {
                orphaned_jobs.push(*job_id);
                false
            } else {
                true
            }
        });
        orphaned_jobs.sort_unstable();

        Some(RemovedNode {
            host: host.to_string(),
            orphaned_jobs,
        })
    }

    /// Advance the logical clock by one tick and prune every timeline.
    pub fn advance_clock(&mut self) -> u64 {
        self.clock += 1;
        let (now, window) = (self.clock, self.window_ticks);
        for node in self.nodes.values_mut() {
            for slot in node.slots.iter_mut() {
                slot.prune(now, window);
            }
        }
        self.clock
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            clock: self.clock,
            window_ticks: self.window_ticks,
            dropped_updates: self.dropped_updates,
            nodes: self
                .nodes
                .values()
                .map(|node| NodeSnapshot {
                    id: node.id(),
                    host: node.host().to_string(),
                    color: node.color(),
                    capacity: node.capacity(),
                    capacity_reported: node.capacity_reported(),
                    last_seen_age: node.last_seen_age(),
                    slots: node
                        .slots()
                        .iter()
                        .map(|slot| SlotSnapshot {
                            id: slot.id(),
                            is_free: slot.is_free(),
                            fully_idle: slot.fully_idle(),
                            last_update: slot.last_update(),
                            entries: slot.timeline().entries().cloned().collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new(600)
    }
}
