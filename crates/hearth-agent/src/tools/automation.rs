//! Automation tools: `create_automation`, `list_automations`, `trigger_automation`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolResult};
use crate::home::HomeHandle;

pub struct CreateAutomationTool {
    home: Arc<dyn HomeHandle>,
}

impl CreateAutomationTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for CreateAutomationTool {
    fn name(&self) -> &str {
        "create_automation"
    }

    fn description(&self) -> &str {
        "Create a home automation from a YAML trigger/condition/action definition."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "yaml": { "type": "string", "description": "Automation definition in YAML" }
            },
            "required": ["yaml"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let yaml = match input.get("yaml").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: yaml"),
        };
        match self.home.create_automation(yaml).await {
            Ok(summary) => {
                ToolResult::success(serde_json::to_string(&summary).unwrap_or_default())
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct ListAutomationsTool {
    home: Arc<dyn HomeHandle>,
}

impl ListAutomationsTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for ListAutomationsTool {
    fn name(&self) -> &str {
        "list_automations"
    }

    fn description(&self) -> &str {
        "List configured automations."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        match self.home.list_automations().await {
            Ok(list) => ToolResult::success(serde_json::to_string(&list).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct TriggerAutomationTool {
    home: Arc<dyn HomeHandle>,
}

impl TriggerAutomationTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for TriggerAutomationTool {
    fn name(&self) -> &str {
        "trigger_automation"
    }

    fn description(&self) -> &str {
        "Manually trigger an automation by id, bypassing its normal trigger conditions."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "automation_id": { "type": "string" }
            },
            "required": ["automation_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let id = match input.get("automation_id").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: automation_id"),
        };
        match self.home.trigger_automation(id).await {
            Ok(()) => ToolResult::success(serde_json::json!({"ok": true}).to_string()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home::MockHome;

    #[tokio::test]
    async fn create_then_trigger_round_trips() {
        let home: Arc<dyn HomeHandle> = Arc::new(MockHome::new());
        let create = CreateAutomationTool::new(home.clone());
        let result = create
            .execute(serde_json::json!({"yaml": "alias: test\ntrigger: []"}))
            .await;
        assert!(!result.is_error);
        let summary: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        let id = summary["automation_id"].as_str().unwrap();

        let trigger = TriggerAutomationTool::new(home);
        let result = trigger
            .execute(serde_json::json!({"automation_id": id}))
            .await;
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn create_automation_rejects_empty_yaml() {
        let home: Arc<dyn HomeHandle> = Arc::new(MockHome::new());
        let create = CreateAutomationTool::new(home);
        let result = create.execute(serde_json::json!({"yaml": ""})).await;
        assert!(result.is_error);
    }
}
