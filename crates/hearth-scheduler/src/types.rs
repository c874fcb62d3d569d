use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defines when and how often a job should run. `Cron` carries a real
/// 5-field minute/hour/day-of-month/month/day-of-week expression; the other
/// variants are convenience kinds a UI can offer without asking the user to
/// write cron syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },

    /// Run on a specific weekday (0 = Monday … 6 = Sunday) at the given time (UTC).
    Weekly { weekday: u8, hour: u8, minute: u8 },

    /// Standard 5-field cron expression (minute hour day-of-month month day-of-week).
    Cron { expression: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedBy {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Ok,
    Error,
}

impl std::fmt::Display for JobRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobRunStatus::Ok => write!(f, "ok"),
            JobRunStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for JobRunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ok" => Ok(JobRunStatus::Ok),
            "error" => Ok(JobRunStatus::Error),
            other => Err(format!("unknown job run status: {other}")),
        }
    }
}

/// A persisted scheduled job. Firing synthesizes a user turn in a dedicated
/// session (`scheduler:{job_id}`) carrying `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub name: String,
    pub schedule: Schedule,
    pub prompt: String,
    pub enabled: bool,
    pub one_shot: bool,
    pub created_by: CreatedBy,
    pub created_at: String,
    pub next_run: Option<String>,
    pub last_run: Option<String>,
    pub last_status: Option<JobRunStatus>,
    pub last_error: Option<String>,
}

/// One entry in the scheduler's run history (kept in-process; not required
/// to survive a restart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub job_id: String,
    pub job_name: String,
    pub timestamp: String,
    pub status: JobRunStatus,
    pub duration_ms: u64,
    pub response: Option<String>,
    pub error: Option<String>,
}

/// Process-wide snapshot of the scheduler's health: how many jobs are
/// registered and enabled, the nearest upcoming firing, and how much history
/// has accumulated. Cheap enough to poll on a dashboard tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub job_count: usize,
    pub enabled_job_count: usize,
    pub next_run: Option<String>,
    pub history_count: usize,
}
