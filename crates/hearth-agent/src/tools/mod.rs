//! Tool system for the agent's tool-calling loop.
//!
//! Defines the `Tool` trait every handler implements, plus a registry for
//! turning a configured set of tools into LLM-facing `ToolDefinition`s.

pub mod automation;
pub mod dashboard;
pub mod entity;
pub mod memory;
pub mod rag;
pub mod schedule;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hearth_rag::RagStore;
use hearth_scheduler::SchedulerHandle;

use crate::home::HomeHandle;
use crate::provider::ToolDefinition;

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text content returned to the LLM.
    pub content: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait every tool implements. Each tool struct owns the dependencies it
/// needs (a `HomeHandle`, a `SessionStore`, a `RagStore`, ...) via its own
/// constructor rather than a generic context argument — the registry just
/// holds `Box<dyn Tool>` and doesn't know what's inside.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "get_state").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Registry of configured tools for one session's turn. Built once at
/// startup from whichever tool groups installation config enables.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        to_definitions(&self.tools)
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|b| b.as_ref())
    }

    pub async fn dispatch(&self, name: &str, input: serde_json::Value) -> ToolResult {
        match self.find(name) {
            Some(tool) => tool.execute(input).await,
            None => ToolResult::error(format!("unknown tool: {name}")),
        }
    }
}

/// Static catalog of canonical tool names/descriptions, useful for a
/// `/tools` listing without constructing a full registry.
pub fn tool_catalog() -> Vec<(&'static str, &'static str)> {
    vec![
        ("get_state", "Read the current state of a smart-home entity"),
        ("list_entities", "List entities, optionally filtered by domain/area"),
        ("call_service", "Call a smart-home service (actuate a device)"),
        ("get_history", "Read an entity's state history over a time range"),
        ("create_automation", "Create a home automation from a YAML definition"),
        ("list_automations", "List configured automations"),
        ("trigger_automation", "Manually trigger an automation"),
        ("create_dashboard", "Create a dashboard from a YAML definition"),
        ("remember", "Persist a long-term memory"),
        ("recall", "Search long-term memories"),
        ("forget", "Delete a long-term memory"),
        ("schedule_job", "Schedule a recurring or one-shot agent turn"),
        ("list_jobs", "List scheduled jobs"),
        ("cancel_job", "Cancel a scheduled job"),
        ("search_context", "Search the RAG index across all categories"),
    ]
}

/// Build the full canonical registry (all 15 tools) wired against the given
/// subsystem handles. Installation config that wants a narrower set builds
/// its own `Vec<Box<dyn Tool>>` instead of calling this.
pub fn default_registry(
    home: Arc<dyn HomeHandle>,
    rag_store: Arc<RagStore>,
    scheduler: Arc<SchedulerHandle>,
) -> ToolRegistry {
    ToolRegistry::new(vec![
        Box::new(entity::GetStateTool::new(home.clone())),
        Box::new(entity::ListEntitiesTool::new(home.clone())),
        Box::new(entity::CallServiceTool::new(home.clone())),
        Box::new(entity::GetHistoryTool::new(home.clone())),
        Box::new(automation::CreateAutomationTool::new(home.clone())),
        Box::new(automation::ListAutomationsTool::new(home.clone())),
        Box::new(automation::TriggerAutomationTool::new(home.clone())),
        Box::new(dashboard::CreateDashboardTool::new(home)),
        Box::new(memory::RememberTool::new(rag_store.clone())),
        Box::new(memory::RecallTool::new(rag_store.clone())),
        Box::new(memory::ForgetTool::new(rag_store.clone())),
        Box::new(schedule::ScheduleJobTool::new(scheduler.clone())),
        Box::new(schedule::ListJobsTool::new(scheduler.clone())),
        Box::new(schedule::CancelJobTool::new(scheduler)),
        Box::new(rag::SearchContextTool::new(rag_store)),
    ])
}

/// Convert a slice of tools to API-level tool definitions.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
