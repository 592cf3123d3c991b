use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::errors::RegistryError;
use crate::market_data::MarketData;
use crate::models::tool::Tool;
use crate::systems::{MarketSystem, NewsSystem, RegimeSystem, System};

/// Fixed catalog of tools, built once at startup
pub struct ToolRegistry {
    tools: Vec<Tool>,
    routes: HashMap<String, Arc<dyn System>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Tool schemas in registration order
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// The system that owns `name`, if any
    pub fn get(&self, name: &str) -> Option<&Arc<dyn System>> {
        self.routes.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    systems: Vec<Arc<dyn System>>,
}

impl ToolRegistryBuilder {
    pub fn with_system<S: System + 'static>(mut self, system: S) -> Self {
        self.systems.push(Arc::new(system));
        self
    }

    /// Compose the registered systems. Two systems claiming the same tool
    /// name is an error rather than an overwrite.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut tools = Vec::new();
        let mut routes: HashMap<String, Arc<dyn System>> = HashMap::new();

        for system in self.systems {
            for tool in system.tools() {
                if let Some(existing) = routes.get(&tool.name) {
                    return Err(RegistryError::DuplicateTool {
                        name: tool.name.clone(),
                        first: existing.name().to_string(),
                        second: system.name().to_string(),
                    });
                }
                routes.insert(tool.name.clone(), Arc::clone(&system));
                tools.push(tool.clone());
            }
        }

        info!(
            tools = tools.len(),
            "tool registry ready: {}",
            tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(ToolRegistry { tools, routes })
    }
}

/// The market, regime and news tools over one data source
pub fn default_registry(
    source: Arc<dyn MarketData>,
    model_path: impl Into<PathBuf>,
) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .with_system(MarketSystem::new(Arc::clone(&source)))
        .with_system(RegimeSystem::new(Arc::clone(&source), model_path))
        .with_system(NewsSystem::new(source))
        .build()
}
