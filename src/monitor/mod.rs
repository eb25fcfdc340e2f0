//! The single-writer monitor actor.
//!
//! # Components
//!
//! - [`Monitor`]: owns the job store, the slot registry and the aging state
//! - [`MonitorHandle`]: cloneable sender side used by the feed and the UI
//! - [`Ticker`]: periodic task feeding clock and aging ticks into the mailbox
//!
//! # Flow
//!
//! 1. The feed adapter sends [`MonitorMessage::Event`] for every scheduler event
//! 2. The ingestor updates the job record and hands the snapshot to the registry
//! 3. The registry picks the lane and appends a timeline entry
//! 4. Attached views are notified
//! 5. Once the mailbox is drained, one fresh [`MonitorSnapshot`] is published
//!    for the whole batch
//!
//! Clock ticks advance the timeline and prune it; aging ticks evict silent hosts
//! and retire the jobs that were running there. Both timers can be stopped and
//! restarted without losing state. Timers hold only a weak sender, so dropping
//! the last [`MonitorHandle`] ends the monitor.

pub mod actor;
pub mod ticker;

pub use actor::{Monitor, MonitorHandle, MonitorMessage, MonitorSnapshot};
pub use ticker::{Ticker, TimerKind};
