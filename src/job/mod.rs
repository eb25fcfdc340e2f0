pub mod record;
pub mod store;

pub use record::{JobId, JobOutcome, JobRecord, JobState, Language};
pub use store::JobStore;
