//! Schedule tools: `schedule_job`, `list_jobs`, `cancel_job`, wrapping a
//! `SchedulerHandle` from `hearth-scheduler`.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_scheduler::{validate_cron, CreatedBy, Schedule, SchedulerHandle};

use super::{Tool, ToolResult};

pub struct ScheduleJobTool {
    scheduler: Arc<SchedulerHandle>,
}

impl ScheduleJobTool {
    pub fn new(scheduler: Arc<SchedulerHandle>) -> Self {
        Self { scheduler }
    }
}

fn parse_schedule(input: &serde_json::Value) -> Result<Schedule, String> {
    let kind = input
        .get("schedule_kind")
        .and_then(|v| v.as_str())
        .ok_or("missing required parameter: schedule_kind")?;

    match kind {
        "once" => {
            let at = input
                .get("at")
                .and_then(|v| v.as_str())
                .ok_or("missing required parameter: at")?;
            let at = chrono::DateTime::parse_from_rfc3339(at)
                .map_err(|e| format!("invalid 'at' timestamp: {e}"))?
                .with_timezone(&chrono::Utc);
            Ok(Schedule::Once { at })
        }
        "interval" => {
            let every_secs = input
                .get("every_secs")
                .and_then(|v| v.as_u64())
                .ok_or("missing required parameter: every_secs")?;
            Ok(Schedule::Interval { every_secs })
        }
        "daily" => {
            let hour = input.get("hour").and_then(|v| v.as_u64()).ok_or("missing required parameter: hour")? as u8;
            let minute = input.get("minute").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
            Ok(Schedule::Daily { hour, minute })
        }
        "weekly" => {
            let weekday = input
                .get("weekday")
                .and_then(|v| v.as_u64())
                .ok_or("missing required parameter: weekday")? as u8;
            let hour = input.get("hour").and_then(|v| v.as_u64()).ok_or("missing required parameter: hour")? as u8;
            let minute = input.get("minute").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
            Ok(Schedule::Weekly { weekday, hour, minute })
        }
        "cron" => {
            let expression = input
                .get("expression")
                .and_then(|v| v.as_str())
                .ok_or("missing required parameter: expression")?
                .to_string();
            validate_cron(&expression).map_err(|e| format!("invalid cron expression: {e}"))?;
            Ok(Schedule::Cron { expression })
        }
        other => Err(format!("unknown schedule_kind: {other}")),
    }
}

#[async_trait]
impl Tool for ScheduleJobTool {
    fn name(&self) -> &str {
        "schedule_job"
    }

    fn description(&self) -> &str {
        "Schedule a recurring or one-shot agent turn."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "prompt": { "type": "string", "description": "the prompt to run when the job fires" },
                "one_shot": { "type": "boolean", "default": false },
                "schedule_kind": { "type": "string", "enum": ["once", "interval", "daily", "weekly", "cron"] },
                "at": { "type": "string", "description": "RFC3339 timestamp, for schedule_kind=once" },
                "every_secs": { "type": "integer", "description": "for schedule_kind=interval" },
                "hour": { "type": "integer", "description": "for schedule_kind=daily/weekly" },
                "minute": { "type": "integer", "description": "for schedule_kind=daily/weekly" },
                "weekday": { "type": "integer", "description": "0=Monday..6=Sunday, for schedule_kind=weekly" },
                "expression": { "type": "string", "description": "5-field cron expression, for schedule_kind=cron" }
            },
            "required": ["name", "prompt", "schedule_kind"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let name = match input.get("name").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: name"),
        };
        let prompt = match input.get("prompt").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: prompt"),
        };
        let one_shot = input.get("one_shot").and_then(|v| v.as_bool()).unwrap_or(false);
        let schedule = match parse_schedule(&input) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(e),
        };

        match self.scheduler.add_job(name, schedule, prompt, one_shot, CreatedBy::Agent) {
            Ok(job) => ToolResult::success(serde_json::to_string(&job).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct ListJobsTool {
    scheduler: Arc<SchedulerHandle>,
}

impl ListJobsTool {
    pub fn new(scheduler: Arc<SchedulerHandle>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ListJobsTool {
    fn name(&self) -> &str {
        "list_jobs"
    }

    fn description(&self) -> &str {
        "List all scheduled jobs."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        match self.scheduler.list_jobs() {
            Ok(jobs) => ToolResult::success(serde_json::to_string(&jobs).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct CancelJobTool {
    scheduler: Arc<SchedulerHandle>,
}

impl CancelJobTool {
    pub fn new(scheduler: Arc<SchedulerHandle>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CancelJobTool {
    fn name(&self) -> &str {
        "cancel_job"
    }

    fn description(&self) -> &str {
        "Cancel a scheduled job by id."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "job_id": { "type": "string" } },
            "required": ["job_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let job_id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: job_id"),
        };
        match self.scheduler.remove_job(job_id) {
            Ok(()) => ToolResult::success(serde_json::json!({"ok": true}).to_string()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{KernelError, Result as CoreResult, TurnOutcome, TurnRunner};
    use rusqlite::Connection;
    use tokio_util::sync::CancellationToken;

    struct NoopRunner;

    #[async_trait::async_trait]
    impl TurnRunner for NoopRunner {
        async fn run_turn(
            &self,
            _session_id: &str,
            _input: &str,
            _cancel: CancellationToken,
        ) -> CoreResult<TurnOutcome> {
            Err(KernelError::Internal("not implemented in test".to_string()))
        }
    }

    fn fresh_scheduler() -> Arc<SchedulerHandle> {
        let conn = Connection::open_in_memory().unwrap();
        let runner: Arc<dyn TurnRunner> = Arc::new(NoopRunner);
        Arc::new(SchedulerHandle::new(conn, runner).unwrap())
    }

    #[tokio::test]
    async fn schedule_then_cancel_is_equivalent_to_never_scheduling() {
        let scheduler = fresh_scheduler();
        let before = ListJobsTool::new(scheduler.clone())
            .execute(serde_json::json!({}))
            .await;

        let schedule = ScheduleJobTool::new(scheduler.clone());
        let result = schedule
            .execute(serde_json::json!({
                "name": "daily briefing",
                "prompt": "summarize overnight activity",
                "schedule_kind": "daily",
                "hour": 7,
                "minute": 0
            }))
            .await;
        assert!(!result.is_error);
        let job: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        let job_id = job["job_id"].as_str().unwrap();

        let cancel = CancelJobTool::new(scheduler.clone());
        let result = cancel.execute(serde_json::json!({"job_id": job_id})).await;
        assert!(!result.is_error);

        let after = ListJobsTool::new(scheduler)
            .execute(serde_json::json!({}))
            .await;
        assert_eq!(before.content, after.content);
    }

    #[tokio::test]
    async fn invalid_cron_expression_is_rejected() {
        let scheduler = fresh_scheduler();
        let tool = ScheduleJobTool::new(scheduler);
        let result = tool
            .execute(serde_json::json!({
                "name": "bad",
                "prompt": "x",
                "schedule_kind": "cron",
                "expression": "not a cron"
            }))
            .await;
        assert!(result.is_error);
    }
}
