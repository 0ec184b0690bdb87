//! The agent registry — static mapping from agent id to its descriptor
//! and adapter.
//!
//! Built once during process initialization (construct-then-freeze), then
//! shared as `Arc<AgentRegistry>` and treated as immutable: concurrent
//! reads from any number of dispatcher invocations need no lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::Adapter;
use crate::descriptor::AgentDescriptor;
use crate::error::{InvokeError, RegistryError};

/// One registered agent: its policy record plus the adapter that serves it.
pub struct RegisteredAgent {
    pub descriptor: AgentDescriptor,
    pub adapter: Arc<dyn Adapter>,
}

impl std::fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Registry of all agents known to this process.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, RegisteredAgent>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent. Fails if the id is already present — one agent's
    /// configuration must never silently clobber another's at startup.
    pub fn register(
        &mut self,
        descriptor: AgentDescriptor,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), RegistryError> {
        let id = descriptor.id.clone();
        if self.agents.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.agents.insert(id, RegisteredAgent { descriptor, adapter });
        Ok(())
    }

    /// Look up an agent by id. A miss is terminal for the request — there
    /// is no default or fallback capability.
    pub fn lookup(&self, id: &str) -> Result<&RegisteredAgent, InvokeError> {
        self.agents
            .get(id)
            .ok_or_else(|| InvokeError::UnknownAgent(id.to_string()))
    }

    /// All descriptors, sorted by id for stable listings.
    pub fn descriptors(&self) -> Vec<&AgentDescriptor> {
        let mut all: Vec<&AgentDescriptor> =
            self.agents.values().map(|a| &a.descriptor).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
