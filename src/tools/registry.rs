//! Tool registry: name → (spec, operation).
//!
//! Built once from [`Operation::ALL`] at startup and shared read-only.

use serde_json::Value;
use std::collections::HashMap;

use super::operations::Operation;
use super::schema::ToolSpec;
use crate::types::{Error, Result};

/// One registered tool.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub spec: ToolSpec,
    pub operation: Operation,
}

/// Immutable lookup table of every tool.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry holding the full operation set.
    pub fn with_all_operations() -> Self {
        let mut registry = Self::new();
        for operation in Operation::ALL {
            if let Err(err) = registry.register(operation) {
                tracing::error!(tool = operation.name(), error = %err, "tool registration failed");
            }
        }
        registry
    }

    /// Register an operation under its tool name.
    pub fn register(&mut self, operation: Operation) -> Result<()> {
        let spec = operation.spec();
        if spec.name.is_empty() {
            return Err(Error::validation("tool name cannot be empty"));
        }
        if self.entries.contains_key(&spec.name) {
            return Err(Error::validation(format!(
                "tool '{}' is already registered",
                spec.name
            )));
        }
        self.entries
            .insert(spec.name.clone(), ToolEntry { spec, operation });
        Ok(())
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Tool specs, sorted by name.
    pub fn specs(&self) -> Vec<&ToolSpec> {
        let mut specs: Vec<&ToolSpec> = self.entries.values().map(|e| &e.spec).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// `{name, description, inputSchema}` for every tool, sorted by name.
    pub fn describe(&self) -> Vec<Value> {
        self.specs().into_iter().map(ToolSpec::describe).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_all_operations_registered() {
        let registry = ToolRegistry::with_all_operations();
        assert!(!logs_contain("tool registration failed"));
        assert_eq!(registry.len(), Operation::ALL.len());
        for op in Operation::ALL {
            assert_eq!(registry.get(op.name()).unwrap().operation, op);
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Operation::ListWorkflows).unwrap();
        assert!(registry.register(Operation::ListWorkflows).is_err());
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = ToolRegistry::with_all_operations();
        assert!(registry.has_tool("list_workflows"));
        assert!(!registry.has_tool("List_Workflows"));
        assert!(!registry.has_tool("list_workflows "));
    }

    #[test]
    fn test_describe_sorted_with_schema() {
        let registry = ToolRegistry::with_all_operations();
        let tools = registry.describe();
        assert_eq!(tools.len(), 11);
        assert_eq!(tools[0]["name"], "activate_workflow");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["workflow_id"]));
    }
}
