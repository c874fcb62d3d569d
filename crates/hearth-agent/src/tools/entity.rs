//! Entity tools: `get_state`, `list_entities`, `call_service`, `get_history`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolResult};
use crate::home::HomeHandle;

pub struct GetStateTool {
    home: Arc<dyn HomeHandle>,
}

impl GetStateTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for GetStateTool {
    fn name(&self) -> &str {
        "get_state"
    }

    fn description(&self) -> &str {
        "Read the current state and attributes of a smart-home entity."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "entity_id": { "type": "string", "description": "e.g. light.kitchen" }
            },
            "required": ["entity_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let entity_id = match input.get("entity_id").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: entity_id"),
        };
        match self.home.get_state(entity_id).await {
            Ok(state) => ToolResult::success(serde_json::to_string(&state).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct ListEntitiesTool {
    home: Arc<dyn HomeHandle>,
}

impl ListEntitiesTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for ListEntitiesTool {
    fn name(&self) -> &str {
        "list_entities"
    }

    fn description(&self) -> &str {
        "List entities, optionally filtered by domain and/or area."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string", "description": "e.g. light, sensor, climate" },
                "area": { "type": "string" }
            }
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let domain = input.get("domain").and_then(|v| v.as_str());
        let area = input.get("area").and_then(|v| v.as_str());
        match self.home.list_entities(domain, area).await {
            Ok(entities) => {
                ToolResult::success(serde_json::to_string(&entities).unwrap_or_default())
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct CallServiceTool {
    home: Arc<dyn HomeHandle>,
}

impl CallServiceTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for CallServiceTool {
    fn name(&self) -> &str {
        "call_service"
    }

    fn description(&self) -> &str {
        "Call a smart-home service to actuate one or more devices."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string", "description": "e.g. light, climate" },
                "service": { "type": "string", "description": "e.g. turn_on, set_temperature" },
                "data": { "type": "object", "description": "service call payload, e.g. {entity_id}" }
            },
            "required": ["domain", "service"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let domain = match input.get("domain").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: domain"),
        };
        let service = match input.get("service").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: service"),
        };
        let data = input.get("data").cloned().unwrap_or(serde_json::json!({}));
        match self.home.call_service(domain, service, data).await {
            Ok(result) => ToolResult::success(serde_json::to_string(&result).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct GetHistoryTool {
    home: Arc<dyn HomeHandle>,
}

impl GetHistoryTool {
    pub fn new(home: Arc<dyn HomeHandle>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for GetHistoryTool {
    fn name(&self) -> &str {
        "get_history"
    }

    fn description(&self) -> &str {
        "Read an entity's state history over a time range."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "entity_id": { "type": "string" },
                "start": { "type": "string", "description": "RFC3339 timestamp" },
                "end": { "type": "string", "description": "RFC3339 timestamp" }
            },
            "required": ["entity_id", "start", "end"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let entity_id = match input.get("entity_id").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: entity_id"),
        };
        let start = input.get("start").and_then(|v| v.as_str()).unwrap_or("");
        let end = input.get("end").and_then(|v| v.as_str()).unwrap_or("");
        match self.home.get_history(entity_id, start, end).await {
            Ok(points) => ToolResult::success(serde_json::to_string(&points).unwrap_or_default()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home::{EntityState, MockHome};

    fn home_with_kitchen_light() -> Arc<dyn HomeHandle> {
        let home = MockHome::new();
        home.seed_entity(EntityState {
            entity_id: "light.kitchen".to_string(),
            domain: "light".to_string(),
            friendly_name: "Kitchen Light".to_string(),
            state: "off".to_string(),
            attributes: serde_json::json!({}),
            area: Some("kitchen".to_string()),
        });
        Arc::new(home)
    }

    #[tokio::test]
    async fn get_state_returns_entity_json() {
        let tool = GetStateTool::new(home_with_kitchen_light());
        let result = tool
            .execute(serde_json::json!({"entity_id": "light.kitchen"}))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("Kitchen Light"));
    }

    #[tokio::test]
    async fn get_state_missing_param_is_error() {
        let tool = GetStateTool::new(home_with_kitchen_light());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn call_service_turns_on_light() {
        let tool = CallServiceTool::new(home_with_kitchen_light());
        let result = tool
            .execute(serde_json::json!({
                "domain": "light",
                "service": "turn_on",
                "data": {"entity_id": "light.kitchen"}
            }))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("\"ok\":true"));
    }
}
