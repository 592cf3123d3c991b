use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while resolving or running a tool.
///
/// These never leave the tool executor; they are rendered into the
/// `{"error": ...}` payload that goes back to the model.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to the completion endpoint. These propagate out of
/// [`crate::agent::Agent::run`].
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Raised while composing the tool registry at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name '{name}' registered by '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
}
