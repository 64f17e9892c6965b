pub mod job;
pub mod monitor;
pub mod runner;

pub use job::{JobContext, JobOutcome, JobSpec};
pub use monitor::{MonitorLoop, MonitorResult, POLL_INTERVAL};
pub use runner::{JobHandle, JobRunner};
