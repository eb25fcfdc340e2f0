pub mod config;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod job;
pub mod monitor;
pub mod registry;
pub mod shutdown;
pub mod view;

pub use error::{MonitorError, Result};
