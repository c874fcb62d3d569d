use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use hearth_core::TurnRunner;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::schedule::compute_next_run;
use crate::types::{CreatedBy, HistoryRecord, Job, JobRunStatus, Schedule, SchedulerStatus};

const HISTORY_CAPACITY: usize = 200;

fn session_id_for(job_id: &str) -> String {
    format!("scheduler:{job_id}")
}

/// Shared handle for job management (add/list/enable/remove/run_now) that
/// can be cloned into WS handlers independently of the engine's own tick
/// loop. Job mutations are rare and never held across I/O.
#[derive(Clone)]
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
    history: Arc<Mutex<VecDeque<HistoryRecord>>>,
    runner: Arc<dyn TurnRunner>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection, runner: Arc<dyn TurnRunner>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            history: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY))),
            runner,
        })
    }

    #[instrument(skip(self))]
    pub fn add_job(
        &self,
        name: &str,
        schedule: Schedule,
        prompt: &str,
        one_shot: bool,
        created_by: CreatedBy,
    ) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
        let job_id = Uuid::new_v4().to_string();
        let schedule_json = serde_json::to_string(&schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let created_by_str = match created_by {
            CreatedBy::User => "user",
            CreatedBy::Agent => "agent",
        };

        conn.execute(
            "INSERT INTO jobs
             (job_id, name, schedule, prompt, enabled, one_shot, created_by, created_at, next_run)
             VALUES (?1,?2,?3,?4,1,?5,?6,?7,?8)",
            params![job_id, name, schedule_json, prompt, one_shot as i64, created_by_str, now_str, next],
        )?;
        info!(job_id = %job_id, %name, "job added");
        Ok(Job {
            job_id,
            name: name.to_string(),
            schedule,
            prompt: prompt.to_string(),
            enabled: true,
            one_shot,
            created_by,
            created_at: now_str,
            next_run: next,
            last_run: None,
            last_status: None,
            last_error: None,
        })
    }

    #[instrument(skip(self))]
    pub fn remove_job(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM jobs WHERE job_id = ?1", [job_id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound {
                id: job_id.to_string(),
            });
        }
        info!(job_id, "job removed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn enable_job(&self, job_id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE jobs SET enabled = ?1 WHERE job_id = ?2",
            params![enabled as i64, job_id],
        )?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound {
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        list_jobs_with(&conn)
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryRecord> {
        let history = self.history.lock().unwrap();
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Snapshot of job counts and the nearest upcoming firing, for a status
    /// check that doesn't require listing every job.
    pub fn status(&self) -> Result<SchedulerStatus> {
        let conn = self.conn.lock().unwrap();
        let jobs = list_jobs_with(&conn)?;
        let enabled_job_count = jobs.iter().filter(|j| j.enabled).count();
        let next_run = jobs
            .iter()
            .filter(|j| j.enabled)
            .filter_map(|j| j.next_run.clone())
            .min();
        Ok(SchedulerStatus {
            job_count: jobs.len(),
            enabled_job_count,
            next_run,
            history_count: self.history.lock().unwrap().len(),
        })
    }

    /// Execute a job immediately, outside its normal schedule, recording the
    /// result in history the same way a tick-fired run would.
    pub async fn run_now(&self, job_id: &str) -> Result<HistoryRecord> {
        let job = {
            let conn = self.conn.lock().unwrap();
            get_job(&conn, job_id)?
        };
        let record = dispatch_job(&self.runner, &job).await;
        self.history.lock().unwrap().push_back(record.clone());
        if self.history.lock().unwrap().len() > HISTORY_CAPACITY {
            self.history.lock().unwrap().pop_front();
        }
        Ok(record)
    }
}

fn get_job(conn: &Connection, job_id: &str) -> Result<Job> {
    conn.query_row(
        "SELECT job_id, name, schedule, prompt, enabled, one_shot, created_by, created_at,
                next_run, last_run, last_status, last_error
         FROM jobs WHERE job_id = ?1",
        [job_id],
        row_to_job,
    )
    .optional()?
    .ok_or_else(|| SchedulerError::JobNotFound {
        id: job_id.to_string(),
    })
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let schedule_json: String = row.get(2)?;
    let schedule: Schedule = serde_json::from_str(&schedule_json).unwrap_or(Schedule::Interval {
        every_secs: 3600,
    });
    let created_by_str: String = row.get(6)?;
    let created_by = if created_by_str == "agent" {
        CreatedBy::Agent
    } else {
        CreatedBy::User
    };
    let last_status: Option<String> = row.get(10)?;
    Ok(Job {
        job_id: row.get(0)?,
        name: row.get(1)?,
        schedule,
        prompt: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        one_shot: row.get::<_, i64>(5)? != 0,
        created_by,
        created_at: row.get(7)?,
        next_run: row.get(8)?,
        last_run: row.get(9)?,
        last_status: last_status.and_then(|s| s.parse().ok()),
        last_error: row.get(11)?,
    })
}

fn list_jobs_with(conn: &Connection) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(
        "SELECT job_id, name, schedule, prompt, enabled, one_shot, created_by, created_at,
                next_run, last_run, last_status, last_error
         FROM jobs ORDER BY created_at",
    )?;
    let jobs = stmt
        .query_map([], row_to_job)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(jobs)
}

async fn dispatch_job(runner: &Arc<dyn TurnRunner>, job: &Job) -> HistoryRecord {
    let started = std::time::Instant::now();
    let session_id = session_id_for(&job.job_id);
    let input = format!("[scheduled: {}]", job.prompt);
    let now = Utc::now().to_rfc3339();

    match runner
        .run_turn(&session_id, &input, CancellationToken::new())
        .await
    {
        Ok(outcome) => HistoryRecord {
            job_id: job.job_id.clone(),
            job_name: job.name.clone(),
            timestamp: now,
            status: JobRunStatus::Ok,
            duration_ms: started.elapsed().as_millis() as u64,
            response: Some(outcome.final_text),
            error: None,
        },
        Err(e) => HistoryRecord {
            job_id: job.job_id.clone(),
            job_name: job.name.clone(),
            timestamp: now,
            status: JobRunStatus::Error,
            duration_ms: started.elapsed().as_millis() as u64,
            response: None,
            error: Some(e.to_string()),
        },
    }
}

/// Drives job execution on a 1-second tick — sufficient because cron
/// granularity is whole minutes. Jobs run serially within the scheduler to
/// avoid flooding the LLM with concurrent cron turns; user-initiated turns
/// run independently in parallel.
pub struct SchedulerEngine {
    handle: SchedulerHandle,
}

impl SchedulerEngine {
    pub fn new(handle: SchedulerHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let due: Vec<Job> = {
            let conn = self.handle.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT job_id, name, schedule, prompt, enabled, one_shot, created_by, created_at,
                        next_run, last_run, last_status, last_error
                 FROM jobs WHERE enabled = 1 AND next_run IS NOT NULL AND next_run <= ?1",
            )?;
            stmt.query_map([&now_str], row_to_job)?
                .filter_map(|r| r.ok())
                .collect()
        };

        for job in due {
            let record = dispatch_job(&self.handle.runner, &job).await;

            let next = if job.one_shot && record.status == JobRunStatus::Ok {
                None
            } else {
                compute_next_run(&job.schedule, now).map(|dt| dt.to_rfc3339())
            };
            let enabled = !(job.one_shot && record.status == JobRunStatus::Ok);
            let last_status_str = record.status.to_string();

            {
                let conn = self.handle.conn.lock().unwrap();
                conn.execute(
                    "UPDATE jobs SET next_run=?1, last_run=?2, last_status=?3, last_error=?4, enabled=?5
                     WHERE job_id=?6",
                    params![next, now_str, last_status_str, record.error, enabled as i64, job.job_id],
                )?;
            }

            if record.status == JobRunStatus::Error {
                warn!(job_id = %job.job_id, error = ?record.error, "scheduled job failed");
            }

            let mut history = self.handle.history.lock().unwrap();
            history.push_back(record);
            if history.len() > HISTORY_CAPACITY {
                history.pop_front();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{KernelError, Result as CoreResult, TurnOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl TurnRunner for CountingRunner {
        async fn run_turn(
            &self,
            _session_id: &str,
            input: &str,
            _cancel: CancellationToken,
        ) -> CoreResult<TurnOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(KernelError::Internal("boom".to_string()))
            } else {
                Ok(TurnOutcome {
                    message_id: hearth_core::new_id(),
                    final_text: format!("handled: {input}"),
                })
            }
        }
    }

    fn fresh_handle(runner: Arc<dyn TurnRunner>) -> SchedulerHandle {
        let conn = Connection::open_in_memory().unwrap();
        SchedulerHandle::new(conn, runner).unwrap()
    }

    #[tokio::test]
    async fn add_then_remove_job_leaves_store_equivalent() {
        let runner: Arc<dyn TurnRunner> = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let handle = fresh_handle(runner);
        let before = handle.list_jobs().unwrap().len();
        let job = handle
            .add_job(
                "test",
                Schedule::Interval { every_secs: 60 },
                "say hi",
                false,
                CreatedBy::User,
            )
            .unwrap();
        handle.remove_job(&job.job_id).unwrap();
        let after = handle.list_jobs().unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn run_now_records_history() {
        let runner: Arc<dyn TurnRunner> = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let handle = fresh_handle(runner);
        let job = handle
            .add_job(
                "morning",
                Schedule::Cron {
                    expression: "0 7 * * *".to_string(),
                },
                "Good morning briefing",
                false,
                CreatedBy::User,
            )
            .unwrap();
        let record = handle.run_now(&job.job_id).await.unwrap();
        assert_eq!(record.status, JobRunStatus::Ok);
        assert_eq!(handle.history(10).len(), 1);
    }

    #[tokio::test]
    async fn status_reports_job_and_history_counts() {
        let runner: Arc<dyn TurnRunner> = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let handle = fresh_handle(runner);
        let job = handle
            .add_job(
                "morning",
                Schedule::Interval { every_secs: 60 },
                "Good morning briefing",
                false,
                CreatedBy::User,
            )
            .unwrap();
        handle.run_now(&job.job_id).await.unwrap();

        let status = handle.status().unwrap();
        assert_eq!(status.job_count, 1);
        assert_eq!(status.enabled_job_count, 1);
        assert!(status.next_run.is_some());
        assert_eq!(status.history_count, 1);
    }

    #[tokio::test]
    async fn tick_fires_due_job_and_reschedules() {
        let runner: Arc<dyn TurnRunner> = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let handle = fresh_handle(runner);
        let job = handle
            .add_job(
                "now",
                Schedule::Once { at: Utc::now() - chrono::Duration::seconds(1) },
                "fire immediately",
                true,
                CreatedBy::User,
            )
            .unwrap();
        let engine = SchedulerEngine::new(handle.clone());
        engine.tick().await.unwrap();
        let jobs = handle.list_jobs().unwrap();
        let updated = jobs.iter().find(|j| j.job_id == job.job_id).unwrap();
        assert!(!updated.enabled, "one-shot job disables after a successful run");
        assert_eq!(handle.history(10).len(), 1);
    }
}
