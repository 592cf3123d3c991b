//! Tool groups exposed to the model
//!
//! Each [`System`] owns a handful of tools, advertises their schemas and
//! dispatches calls to them. The registry composes systems into the catalog
//! sent with every completion request.
pub mod market;
pub mod news;
pub mod regime;

#[cfg(test)]
pub mod fixtures;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

pub use market::MarketSystem;
pub use news::NewsSystem;
pub use regime::RegimeSystem;

/// Core trait that defines a group of tools the agent can call
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given arguments
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value>;
}

/// Bind raw tool arguments to a typed struct. A missing argument object is
/// treated as empty so tools with only optional fields still bind.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> AgentResult<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

pub fn normalize_ticker(ticker: &str) -> AgentResult<String> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(AgentError::InvalidParameters(
            "ticker must not be empty".into(),
        ));
    }
    Ok(ticker.to_uppercase())
}

/// First `limit` characters of `text`, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
