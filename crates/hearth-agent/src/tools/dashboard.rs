//! Dashboard tool: `create_dashboard`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolResult};
use crate::home::HomeHandle;

pub struct CreateDashboardTool {
    home: Arc<dyn HomeHandle>,
}

impl CreateDashboardTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for CreateDashboardTool {
    fn name(&self) -> &str {
        "create_dashboard"
    }

    fn description(&self) -> &str {
        "Create a dashboard view from a YAML definition of cards and layout."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "yaml": { "type": "string", "description": "Dashboard definition in YAML" }
            },
            "required": ["yaml"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let yaml = match input.get("yaml").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: yaml"),
        };
        match self.home.create_dashboard(yaml).await {
            Ok(dashboard_id) => {
                ToolResult::success(serde_json::json!({"dashboard_id": dashboard_id}).to_string())
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home::MockHome;

    #[tokio::test]
    async fn create_dashboard_returns_id() {
        let home: Arc<dyn HomeHandle> = Arc::new(MockHome::new());
        let tool = CreateDashboardTool::new(home);
        let result = tool
            .execute(serde_json::json!({"yaml": "title: Home\ncards: []"}))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("dashboard_id"));
    }
}
