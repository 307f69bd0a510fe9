// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::tool::Tool;

/// A tool descriptor handed to the transport layer.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Central registry holding all exposed tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Descriptors for every registered tool, sorted by name.  The schema
    /// shape depends on auto mode (see [`crate::tool::base_schema`]).
    pub fn schemas(&self, auto_mode: bool, available_models: &[String]) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(auto_mode, available_models),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{
        base_schema, PreparedPrompt, ToolContext, ToolError, ToolRequest,
    };
    use conduit_model::ToolModelCategory;
    use serde_json::json;

    struct StubTool {
        name: &'static str,
    }

    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "a stub"
        }
        fn input_schema(&self, auto_mode: bool, models: &[String]) -> Value {
            base_schema(auto_mode, models, json!({}), &["prompt"])
        }
        fn category(&self) -> ToolModelCategory {
            ToolModelCategory::FastResponse
        }
        fn system_prompt(&self) -> &str {
            "stub"
        }
        fn prepare_prompt(
            &self,
            request: &ToolRequest,
            _ctx: &ToolContext<'_>,
        ) -> Result<PreparedPrompt, ToolError> {
            Ok(PreparedPrompt {
                text: request.prompt.clone(),
                files: Vec::new(),
            })
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool { name: "chat" });
        assert!(reg.get("chat").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool { name: "zeta" });
        reg.register(StubTool { name: "alpha" });
        let schemas = reg.schemas(false, &[]);
        assert_eq!(schemas[0].name, "alpha");
        assert_eq!(schemas[1].name, "zeta");
    }

    #[test]
    fn auto_mode_flows_into_every_schema() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool { name: "chat" });
        let schemas = reg.schemas(true, &["flash".into()]);
        let required = schemas[0].parameters["required"].as_array().unwrap();
        assert!(required.contains(&json!("model")));
    }

    #[test]
    fn registering_same_name_twice_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool { name: "t" });
        reg.register(StubTool { name: "t" });
        assert_eq!(reg.len(), 1);
    }
}
