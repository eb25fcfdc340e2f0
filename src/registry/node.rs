use serde::{Serialize, Serializer};

use crate::registry::slot::{Slot, SlotId};

/// Stable handle of a node; never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Deterministic lane color for a host: the hue comes from a FNV-1a hash of
/// the name, saturation and value are fixed so every host stays readable.
pub fn color_for_host(host: &str) -> Color {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in host.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hsv_to_rgb((hash % 360) as f32, 0.55, 0.9)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Color {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let scale = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color {
        r: scale(r),
        g: scale(g),
        b: scale(b),
    }
}

/// A reporting host and its ordered lanes.
///
/// Slot order is insertion order and is never re-sorted.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    host: String,
    color: Color,
    capacity: u32,
    capacity_reported: bool,
    pub(crate) slots: Vec<Slot>,
    last_seen_age: u32,
}

impl Node {
    pub fn new(id: NodeId, host: String, color: Color) -> Self {
        Self {
            id,
            host,
            color,
            capacity: 0,
            capacity_reported: false,
            slots: Vec::new(),
            last_seen_age: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// False until the scheduler reported `max_kids`; until then capacity is
    /// inferred from observed concurrency.
    pub fn capacity_reported(&self) -> bool {
        self.capacity_reported
    }

    pub fn last_seen_age(&self) -> u32 {
        self.last_seen_age
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id() == id)
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id() == id)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub(crate) fn set_reported_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
        self.capacity_reported = true;
    }

    pub(crate) fn infer_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen_age = 0;
    }

    pub(crate) fn bump_age(&mut self) -> u32 {
        self.last_seen_age = self.last_seen_age.saturating_add(1);
        self.last_seen_age
    }

    /// Slot a job new to this host should take: the first free lane that has
    /// done work before, else the first never-used lane.
    pub fn free_slot_for_new_job(&self) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|s| s.is_free() && !s.fully_idle())
            .or_else(|| self.slots.iter().find(|s| s.fully_idle()))
            .map(Slot::id)
    }

    /// Remove free lanes from the end until the node fits its capacity.
    /// Occupied lanes are never removed. Returns the removed slot ids.
    pub(crate) fn trim_excess(&mut self) -> Vec<SlotId> {
        let mut removed = Vec::new();
        while self.slots.len() > self.capacity as usize {
            let Some(index) = self.slots.iter().rposition(Slot::is_free) else {
                break;
            };
            removed.push(self.slots.remove(index).id());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_deterministic_per_host() {
        assert_eq!(color_for_host("alpha"), color_for_host("alpha"));
        assert_ne!(color_for_host("alpha"), color_for_host("beta"));
    }

    #[test]
    fn color_displays_as_hex() {
        let color = Color { r: 255, g: 8, b: 0 };
        assert_eq!(color.to_string(), "#ff0800");
    }

    #[test]
    fn hsv_primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Color { r: 255, g: 0, b: 0 });
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Color { r: 0, g: 255, b: 0 });
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Color { r: 0, g: 0, b: 255 });
    }

    #[test]
    fn trim_excess_stops_at_occupied_slots() {
        let mut node = Node::new(NodeId(1), "alpha".to_string(), color_for_host("alpha"));
        for id in 0..3 {
            node.slots.push(Slot::placeholder(SlotId(id), 0));
        }
        let mut job = crate::job::JobRecord::local(9, "alpha".to_string(), String::new());
        job.begin("alpha".to_string(), None).unwrap();
        node.slots[0].record(job.clone(), 1);
        let mut other = job.clone();
        other.id = 10;
        node.slots[2].record(other, 1);

        node.set_reported_capacity(1);
        assert_eq!(node.trim_excess(), vec![SlotId(1)]);
        assert_eq!(node.slots().len(), 2);
        assert_eq!(node.occupied_count(), 2);
    }
}
