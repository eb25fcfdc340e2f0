//! Scheduler feed: typed events, the ingestor that applies them to job
//! records, and a JSON-lines adapter for reading a feed from any async reader.

pub mod event;
pub mod ingestor;
pub mod source;

pub use event::SchedulerEvent;
pub use ingestor::{EventIngestor, Ingested};
pub use source::{parse_event, pump_events, FeedEnd};
