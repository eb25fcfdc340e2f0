//! Node/slot registry and per-slot timelines.
//!
//! - [`SlotRegistry`]: hosts, their lanes, and the job → lane index
//! - [`Timeline`]: clock-stamped, window-pruned history of one lane
//! - [`AgingMonitor`]: periodic eviction of hosts that went silent
//!
//! Nodes and slots are addressed by [`NodeId`] / [`SlotId`] handles that are
//! never reused, so a snapshot taken before a structural change still names
//! the same lanes afterwards.

pub mod aging;
#[allow(clippy::module_inception)]
pub mod registry;
pub mod node;
pub mod slot;
pub mod snapshot;
pub mod timeline;

pub use aging::AgingMonitor;
pub use node::{color_for_host, Color, Node, NodeId};
pub use registry::{Placement, RemovedNode, SlotRegistry};
pub use slot::{Slot, SlotId};
pub use snapshot::{NodeSnapshot, RegistrySnapshot, SlotSnapshot};
pub use timeline::{RenderMetrics, Timeline, TimelineEntry};
