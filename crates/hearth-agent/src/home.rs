//! The external smart-home control plane, modeled as a single trait boundary.
//!
//! A real implementation (entity registry, service-call bus, history store)
//! lives in someone else's crate; this module only specifies the interface
//! the Entity/Automation/Dashboard tools dispatch through, plus a test
//! double used by every tool/orchestrator test in this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub domain: String,
    pub friendly_name: String,
    pub state: String,
    pub attributes: serde_json::Value,
    pub area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCallResult {
    pub ok: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSummary {
    pub automation_id: String,
    pub alias: String,
    pub enabled: bool,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum HomeError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("automation not found: {0}")]
    AutomationNotFound(String),
    #[error("invalid yaml: {0}")]
    InvalidYaml(String),
    #[error("control plane unavailable: {0}")]
    Unavailable(String),
}

impl From<HomeError> for hearth_core::KernelError {
    fn from(e: HomeError) -> Self {
        match e {
            HomeError::EntityNotFound(_) | HomeError::AutomationNotFound(_) => {
                hearth_core::KernelError::NotFound(e.to_string())
            }
            HomeError::InvalidYaml(_) => hearth_core::KernelError::InvalidInput(e.to_string()),
            HomeError::Unavailable(_) => hearth_core::KernelError::Tool(e.to_string()),
        }
    }
}

/// The external control plane boundary: entity registry, service-call bus,
/// history, and automation/dashboard storage. Every tool that touches the
/// smart home goes through this trait, never a concrete client directly.
#[async_trait]
pub trait HomeHandle: Send + Sync {
    async fn get_state(&self, entity_id: &str) -> Result<EntityState, HomeError>;

    async fn list_entities(
        &self,
        domain: Option<&str>,
        area: Option<&str>,
    ) -> Result<Vec<EntityState>, HomeError>;

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: serde_json::Value,
    ) -> Result<ServiceCallResult, HomeError>;

    async fn get_history(
        &self,
        entity_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<HistoryPoint>, HomeError>;

    async fn create_automation(&self, yaml: &str) -> Result<AutomationSummary, HomeError>;

    async fn list_automations(&self) -> Result<Vec<AutomationSummary>, HomeError>;

    async fn trigger_automation(&self, automation_id: &str) -> Result<(), HomeError>;

    async fn create_dashboard(&self, yaml: &str) -> Result<String, HomeError>;
}

/// In-memory test double. Entities are seeded up front; service calls flip
/// `state` directly rather than simulating device behavior.
pub struct MockHome {
    entities: Mutex<HashMap<String, EntityState>>,
    automations: Mutex<HashMap<String, AutomationSummary>>,
}

impl MockHome {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            automations: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed_entity(&self, entity: EntityState) {
        self.entities
            .lock()
            .unwrap()
            .insert(entity.entity_id.clone(), entity);
    }
}

impl Default for MockHome {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HomeHandle for MockHome {
    async fn get_state(&self, entity_id: &str) -> Result<EntityState, HomeError> {
        self.entities
            .lock()
            .unwrap()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| HomeError::EntityNotFound(entity_id.to_string()))
    }

    async fn list_entities(
        &self,
        domain: Option<&str>,
        area: Option<&str>,
    ) -> Result<Vec<EntityState>, HomeError> {
        let entities = self.entities.lock().unwrap();
        Ok(entities
            .values()
            .filter(|e| domain.map(|d| d == e.domain).unwrap_or(true))
            .filter(|e| area.map(|a| e.area.as_deref() == Some(a)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: serde_json::Value,
    ) -> Result<ServiceCallResult, HomeError> {
        let entity_id = data.get("entity_id").and_then(|v| v.as_str());
        if let Some(entity_id) = entity_id {
            let mut entities = self.entities.lock().unwrap();
            if let Some(entity) = entities.get_mut(entity_id) {
                entity.state = match service {
                    "turn_on" => "on".to_string(),
                    "turn_off" => "off".to_string(),
                    other => other.to_string(),
                };
            } else {
                return Err(HomeError::EntityNotFound(entity_id.to_string()));
            }
        }
        Ok(ServiceCallResult {
            ok: true,
            message: Some(format!("{domain}.{service} applied")),
        })
    }

    async fn get_history(
        &self,
        entity_id: &str,
        _start: &str,
        _end: &str,
    ) -> Result<Vec<HistoryPoint>, HomeError> {
        let entities = self.entities.lock().unwrap();
        let entity = entities
            .get(entity_id)
            .ok_or_else(|| HomeError::EntityNotFound(entity_id.to_string()))?;
        Ok(vec![HistoryPoint {
            timestamp: chrono::Utc::now().to_rfc3339(),
            state: entity.state.clone(),
        }])
    }

    async fn create_automation(&self, yaml: &str) -> Result<AutomationSummary, HomeError> {
        if yaml.trim().is_empty() {
            return Err(HomeError::InvalidYaml("empty automation body".to_string()));
        }
        let id = hearth_core::new_id();
        let summary = AutomationSummary {
            automation_id: id.clone(),
            alias: format!("automation_{id}"),
            enabled: true,
        };
        self.automations
            .lock()
            .unwrap()
            .insert(id, summary.clone());
        Ok(summary)
    }

    async fn list_automations(&self) -> Result<Vec<AutomationSummary>, HomeError> {
        Ok(self.automations.lock().unwrap().values().cloned().collect())
    }

    async fn trigger_automation(&self, automation_id: &str) -> Result<(), HomeError> {
        if self.automations.lock().unwrap().contains_key(automation_id) {
            Ok(())
        } else {
            Err(HomeError::AutomationNotFound(automation_id.to_string()))
        }
    }

    async fn create_dashboard(&self, yaml: &str) -> Result<String, HomeError> {
        if yaml.trim().is_empty() {
            return Err(HomeError::InvalidYaml("empty dashboard body".to_string()));
        }
        Ok(hearth_core::new_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, domain: &str, state: &str) -> EntityState {
        EntityState {
            entity_id: id.to_string(),
            domain: domain.to_string(),
            friendly_name: id.to_string(),
            state: state.to_string(),
            attributes: serde_json::json!({}),
            area: Some("kitchen".to_string()),
        }
    }

    #[tokio::test]
    async fn call_service_flips_light_state() {
        let home = MockHome::new();
        home.seed_entity(entity("light.kitchen", "light", "off"));
        home.call_service(
            "light",
            "turn_on",
            serde_json::json!({"entity_id": "light.kitchen"}),
        )
        .await
        .unwrap();
        let state = home.get_state("light.kitchen").await.unwrap();
        assert_eq!(state.state, "on");
    }

    #[tokio::test]
    async fn list_entities_filters_by_domain() {
        let home = MockHome::new();
        home.seed_entity(entity("light.kitchen", "light", "off"));
        home.seed_entity(entity("sensor.temp", "sensor", "21"));
        let lights = home.list_entities(Some("light"), None).await.unwrap();
        assert_eq!(lights.len(), 1);
    }

    #[tokio::test]
    async fn unknown_entity_is_not_found() {
        let home = MockHome::new();
        let err = home.get_state("light.missing").await.unwrap_err();
        assert!(matches!(err, HomeError::EntityNotFound(_)));
    }
}
