use futures::future::join_all;
use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{ToolRequest, ToolResponse};
use crate::models::tool::ToolCall;
use crate::registry::ToolRegistry;

/// Runs tool calls against the registry and turns every outcome into the
/// string payload returned to the model. Execution never fails: unknown
/// tools, bad arguments, tool errors and panics all become `{"error": ...}`.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, tool_call: &ToolCall) -> String {
        render_result(&self.dispatch(tool_call).await)
    }

    async fn dispatch(&self, tool_call: &ToolCall) -> AgentResult<Value> {
        let system = self
            .registry
            .get(&tool_call.name)
            .ok_or_else(|| AgentError::ToolNotFound(tool_call.name.clone()))?;

        match AssertUnwindSafe(system.call(tool_call.clone()))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %tool_call.name, "tool panicked");
                Err(AgentError::Internal(format!(
                    "tool '{}' panicked",
                    tool_call.name
                )))
            }
        }
    }

    /// One response per request, in request order
    pub async fn execute_all(&self, requests: &[&ToolRequest], parallel: bool) -> Vec<ToolResponse> {
        if parallel {
            let futures = requests.iter().map(|request| async move {
                ToolResponse {
                    id: request.id.clone(),
                    payload: self.execute(&request.tool_call).await,
                }
            });
            return join_all(futures).await;
        }

        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(ToolResponse {
                id: request.id.clone(),
                payload: self.execute(&request.tool_call).await,
            });
        }
        responses
    }
}

/// Pretty-printed JSON for a tool outcome, errors as `{"error": message}`
pub fn render_result(result: &AgentResult<Value>) -> String {
    let value = match result {
        Ok(value) => value.clone(),
        Err(e) => {
            debug!("tool error: {}", e);
            json!({"error": e.to_string()})
        }
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| {
        json!({"error": format!("Internal error: {}", e)}).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::Tool;
    use crate::systems::System;
    use async_trait::async_trait;
    use std::time::Duration;

    struct ScratchSystem {
        tools: Vec<Tool>,
    }

    impl ScratchSystem {
        fn new() -> Self {
            Self {
                tools: ["echo", "fail", "explode", "slow"]
                    .iter()
                    .map(|name| Tool::new(*name, "test tool", json!({"type": "object"})))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl System for ScratchSystem {
        fn name(&self) -> &str {
            "scratch"
        }

        fn description(&self) -> &str {
            "tools for exercising the executor"
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
            match tool_call.name.as_str() {
                "echo" => Ok(json!({"echo": tool_call.arguments})),
                "fail" => Err(AgentError::ExecutionError("upstream said no".into())),
                "explode" => panic!("boom"),
                "slow" => {
                    let millis = tool_call.arguments["millis"].as_u64().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    Ok(json!({"slept": millis}))
                }
                other => Err(AgentError::ToolNotFound(other.to_string())),
            }
        }
    }

    fn executor() -> ToolExecutor {
        let registry = ToolRegistry::builder()
            .with_system(ScratchSystem::new())
            .build()
            .unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    fn payload(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_pretty_json() {
        let out = executor()
            .execute(&ToolCall::new("echo", json!({"ticker": "AAPL"})))
            .await;
        assert_eq!(out, "{\n  \"echo\": {\n    \"ticker\": \"AAPL\"\n  }\n}");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let out = executor()
            .execute(&ToolCall::new("get_weather", json!({})))
            .await;
        assert_eq!(payload(&out), json!({"error": "Unknown tool: get_weather"}));
    }

    #[tokio::test]
    async fn test_tool_error() {
        let out = executor().execute(&ToolCall::new("fail", json!({}))).await;
        assert_eq!(payload(&out), json!({"error": "upstream said no"}));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let out = executor().execute(&ToolCall::new("explode", json!({}))).await;
        assert_eq!(
            payload(&out),
            json!({"error": "Internal error: tool 'explode' panicked"})
        );
    }

    #[tokio::test]
    async fn test_same_call_same_payload() {
        let executor = executor();
        let call = ToolCall::new("echo", json!({"period": "1y", "ticker": "MSFT"}));
        let first = executor.execute(&call).await;
        let second = executor.execute(&call).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_execute_all_preserves_order() {
        let requests = vec![
            ToolRequest {
                id: "toolu_a".into(),
                tool_call: ToolCall::new("slow", json!({"millis": 40})),
            },
            ToolRequest {
                id: "toolu_b".into(),
                tool_call: ToolCall::new("get_weather", json!({})),
            },
            ToolRequest {
                id: "toolu_c".into(),
                tool_call: ToolCall::new("slow", json!({"millis": 1})),
            },
        ];
        let refs: Vec<&ToolRequest> = requests.iter().collect();
        let executor = executor();

        for parallel in [false, true] {
            let responses = executor.execute_all(&refs, parallel).await;
            let ids: Vec<_> = responses.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["toolu_a", "toolu_b", "toolu_c"]);
            assert_eq!(payload(&responses[0].payload), json!({"slept": 40}));
            assert_eq!(
                payload(&responses[1].payload)["error"],
                "Unknown tool: get_weather"
            );
        }
    }

    #[test]
    fn test_render_result() {
        assert_eq!(render_result(&Ok(json!(null))), "null");
        assert_eq!(
            render_result(&Err(AgentError::InvalidParameters("missing field `ticker`".into()))),
            "{\n  \"error\": \"Invalid parameters: missing field `ticker`\"\n}"
        );
    }
}
