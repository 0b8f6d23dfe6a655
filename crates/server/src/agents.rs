// crates/server/src/agents.rs
//! In-memory registry of chat agents.
//!
//! An agent is a named system instruction, optionally bound to a vector
//! index for retrieval-augmented answers.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub name: String,
    pub system_instruction: String,
    /// Index to retrieve context from; `None` means plain chat.
    pub index_name: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl AgentConfig {
    pub fn has_rag(&self) -> bool {
        self.index_name.is_some()
    }
}

/// Fields accepted when creating an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    pub system_instruction: String,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Fields accepted when updating an agent; absent fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub system_instruction: Option<String>,
    pub index_name: Option<Option<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<Option<u32>>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Thread-safe agent registry.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentConfig>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self, spec: AgentCreate) -> AgentConfig {
        let agent = AgentConfig {
            agent_id: Uuid::new_v4().to_string(),
            name: spec.name,
            system_instruction: spec.system_instruction,
            index_name: spec.index_name,
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
            created_at: Utc::now(),
        };
        if let Ok(mut agents) = self.agents.write() {
            agents.insert(agent.agent_id.clone(), agent.clone());
        }
        tracing::info!(agent_id = %agent.agent_id, name = %agent.name, "created agent");
        agent
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentConfig> {
        self.agents.read().ok()?.get(agent_id).cloned()
    }

    pub fn list(&self) -> Vec<AgentConfig> {
        match self.agents.read() {
            Ok(agents) => {
                let mut list: Vec<_> = agents.values().cloned().collect();
                list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                list
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn update(&self, agent_id: &str, update: AgentUpdate) -> Option<AgentConfig> {
        let mut agents = self.agents.write().ok()?;
        let agent = agents.get_mut(agent_id)?;
        if let Some(name) = update.name {
            agent.name = name;
        }
        if let Some(instruction) = update.system_instruction {
            agent.system_instruction = instruction;
        }
        if let Some(index_name) = update.index_name {
            agent.index_name = index_name;
        }
        if let Some(temperature) = update.temperature {
            agent.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            agent.max_tokens = max_tokens;
        }
        Some(agent.clone())
    }

    pub fn delete(&self, agent_id: &str) -> bool {
        match self.agents.write() {
            Ok(mut agents) => agents.remove(agent_id).is_some(),
            Err(_) => false,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, index: Option<&str>) -> AgentCreate {
        AgentCreate {
            name: name.to_string(),
            system_instruction: "You are a helpful assistant.".to_string(),
            index_name: index.map(String::from),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = AgentRegistry::new();
        let agent = registry.create(spec("Support Bot", Some("kb-main")));
        assert!(agent.has_rag());

        let fetched = registry.get(&agent.agent_id).unwrap();
        assert_eq!(fetched.name, "Support Bot");
        assert_eq!(fetched.index_name.as_deref(), Some("kb-main"));
    }

    #[test]
    fn test_get_unknown_agent() {
        let registry = AgentRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_update_partial() {
        let registry = AgentRegistry::new();
        let agent = registry.create(spec("Bot", None));

        let updated = registry
            .update(
                &agent.agent_id,
                AgentUpdate {
                    name: Some("Renamed".to_string()),
                    index_name: Some(Some("kb-main".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert!(updated.has_rag());
        // Untouched fields survive.
        assert_eq!(updated.system_instruction, "You are a helpful assistant.");
    }

    #[test]
    fn test_delete() {
        let registry = AgentRegistry::new();
        let agent = registry.create(spec("Bot", None));
        assert!(registry.delete(&agent.agent_id));
        assert!(!registry.delete(&agent.agent_id));
        assert!(registry.get(&agent.agent_id).is_none());
    }

    #[test]
    fn test_list_sorted_by_creation() {
        let registry = AgentRegistry::new();
        let first = registry.create(spec("A", None));
        let second = registry.create(spec("B", None));
        let ids: Vec<_> = registry.list().into_iter().map(|a| a.agent_id).collect();
        assert_eq!(ids, vec![first.agent_id, second.agent_id]);
    }
}
