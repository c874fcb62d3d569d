pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use schedule::{compute_next_run, validate_cron};
pub use types::{CreatedBy, HistoryRecord, Job, JobRunStatus, Schedule, SchedulerStatus};
