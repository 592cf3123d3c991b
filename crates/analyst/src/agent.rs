use tracing::{debug, info, warn};

use crate::errors::ProviderError;
use crate::executor::ToolExecutor;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::providers::base::{Provider, StopReason, Usage};

/// Round-trip ceiling when none is configured
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

pub const MAX_ITERATIONS_TEXT: &str = "Agent reached maximum iterations without completing.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Completion requests allowed per user turn
    pub max_iterations: usize,
    /// Run the tool requests of one round concurrently
    pub parallel_tool_calls: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            parallel_tool_calls: false,
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The model finished with an answer
    Final,
    /// The model stopped for a reason the loop cannot continue from
    UnexpectedStop(StopReason),
    /// The round-trip ceiling was hit while the model still wanted tools
    MaxIterations,
}

/// Result of one user turn
#[derive(Debug, Clone)]
pub struct Reply {
    /// Text to show the user
    pub text: String,
    /// The full conversation after this turn
    pub messages: Vec<Message>,
    pub outcome: ReplyOutcome,
    /// Completion requests made during the turn
    pub iterations: usize,
    pub usage: Usage,
    turn_start: usize,
}

impl Reply {
    /// Messages appended during this turn, starting with the user message
    pub fn turn_messages(&self) -> &[Message] {
        &self.messages[self.turn_start..]
    }

    /// Tool requests the model made during this turn, in order
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.turn_messages()
            .iter()
            .flat_map(|m| m.tool_requests())
            .collect()
    }
}

/// Drives the tool-use loop: ask the model, run the tools it requests, feed
/// the results back, until it answers or the round-trip ceiling is hit
pub struct Agent {
    provider: Box<dyn Provider>,
    executor: ToolExecutor,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, executor: ToolExecutor, config: AgentConfig) -> Self {
        Self {
            provider,
            executor,
            config,
        }
    }

    /// Run one user turn on top of `history`.
    ///
    /// Tool failures and protocol anomalies are reported in the reply text;
    /// only provider failures are returned as errors. `history` itself is
    /// never modified, so an abandoned turn leaves the caller's conversation
    /// as it was.
    pub async fn run(&self, user_message: &str, history: &[Message]) -> Result<Reply, ProviderError> {
        let mut messages = history.to_vec();
        let turn_start = messages.len();
        messages.push(Message::user().with_text(user_message));

        let tools = self.executor.registry().tools();
        let mut usage = Usage::default();

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, messages = messages.len(), "requesting completion");
            let response = self
                .provider
                .complete(&self.config.system_prompt, &messages, tools)
                .await?;
            accumulate(&mut usage, &response.usage);

            let message = response.message;
            let has_requests = message.has_tool_requests();

            match (&response.stop_reason, has_requests) {
                (StopReason::ToolUse | StopReason::EndTurn, true) => {
                    let requests = message.tool_requests();
                    for request in &requests {
                        info!(
                            round = iteration,
                            tool = %request.tool_call.name,
                            arguments = %request.tool_call.arguments,
                            "tool call"
                        );
                    }

                    let responses = self
                        .executor
                        .execute_all(&requests, self.config.parallel_tool_calls)
                        .await;

                    let mut results = Message::user();
                    for response in responses {
                        info!(
                            round = iteration,
                            id = %response.id,
                            chars = response.payload.chars().count(),
                            "tool result"
                        );
                        results = results.with_content(MessageContent::ToolResponse(response));
                    }

                    messages.push(message);
                    messages.push(results);
                }
                (StopReason::EndTurn, false) => {
                    let text = message.text();
                    messages.push(message);
                    return Ok(Reply {
                        text,
                        messages,
                        outcome: ReplyOutcome::Final,
                        iterations: iteration,
                        usage,
                        turn_start,
                    });
                }
                (stop_reason, _) => {
                    warn!(stop_reason = %stop_reason, "agent stopped unexpectedly");
                    return Ok(Reply {
                        text: format!("Agent stopped unexpectedly: {}", stop_reason),
                        messages,
                        outcome: ReplyOutcome::UnexpectedStop(stop_reason.clone()),
                        iterations: iteration,
                        usage,
                        turn_start,
                    });
                }
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "agent reached maximum iterations"
        );
        Ok(Reply {
            text: MAX_ITERATIONS_TEXT.to_string(),
            messages,
            outcome: ReplyOutcome::MaxIterations,
            iterations: self.config.max_iterations,
            usage,
            turn_start,
        })
    }
}

fn accumulate(total: &mut Usage, usage: &Usage) {
    fn add(total: Option<i32>, value: Option<i32>) -> Option<i32> {
        match (total, value) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        }
    }
    total.input_tokens = add(total.input_tokens, usage.input_tokens);
    total.output_tokens = add(total.output_tokens, usage.output_tokens);
    total.total_tokens = add(total.total_tokens, usage.total_tokens);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::CompanyProfile;
    use crate::models::role::Role;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use crate::registry::default_registry;
    use crate::systems::fixtures::{bars_from_closes, rising_closes, FixtureMarketData};
    use anyhow::Result;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn executor() -> ToolExecutor {
        let source = FixtureMarketData::default()
            .with_bars("AAPL", bars_from_closes(&rising_closes(250)))
            .with_profile(
                "AAPL",
                CompanyProfile {
                    name: Some("Apple Inc.".into()),
                    sector: Some("Technology".into()),
                    ..Default::default()
                },
            );
        let registry = default_registry(Arc::new(source), "/nonexistent/model.json").unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    fn agent(provider: MockProvider, max_iterations: usize) -> Agent {
        Agent::new(
            Box::new(provider),
            executor(),
            AgentConfig {
                system_prompt: "You are a test analyst.".into(),
                max_iterations,
                parallel_tool_calls: false,
            },
        )
    }

    fn tool_round(calls: &[(&str, &str, Value)]) -> (Message, StopReason) {
        let mut message = Message::assistant().with_text("Let me look that up.");
        for (id, name, args) in calls {
            message = message.with_tool_request(*id, ToolCall::new(*name, args.clone()));
        }
        (message, StopReason::ToolUse)
    }

    /// Every tool request is answered, in order, by the next message and no
    /// response is orphaned
    fn assert_paired(messages: &[Message]) {
        let mut answered = 0;
        for (i, message) in messages.iter().enumerate() {
            let requests: Vec<_> = message.tool_requests().iter().map(|r| r.id.clone()).collect();
            if requests.is_empty() {
                continue;
            }
            let next = &messages[i + 1];
            assert_eq!(next.role, Role::User);
            let responses: Vec<_> = next
                .content
                .iter()
                .filter_map(MessageContent::as_tool_response)
                .map(|r| r.id.clone())
                .collect();
            assert_eq!(requests, responses);
            answered += responses.len();
        }
        let all_responses = messages
            .iter()
            .flat_map(|m| m.content.iter().filter_map(MessageContent::as_tool_response))
            .count();
        assert_eq!(answered, all_responses);
    }

    #[tokio::test]
    async fn test_final_text_is_concatenated() -> Result<()> {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("A").with_text("B"),
            StopReason::EndTurn,
        )]);
        let agent = agent(provider, 10);

        let reply = agent.run("hello", &[]).await?;
        assert_eq!(reply.text, "AB");
        assert_eq!(reply.outcome, ReplyOutcome::Final);
        assert_eq!(reply.iterations, 1);
        assert_eq!(reply.messages.len(), 2);
        assert_eq!(reply.messages[0].text(), "hello");
        Ok(())
    }

    #[tokio::test]
    async fn test_analyze_aapl_round_trip() -> Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_round(&[
                ("toolu_01", "get_company_info", json!({"ticker": "AAPL"})),
                ("toolu_02", "get_technical_indicators", json!({"ticker": "AAPL"})),
            ]),
            (
                Message::assistant().with_text("AAPL is in a strong uptrend."),
                StopReason::EndTurn,
            ),
        ]));
        let agent = Agent::new(
            Box::new(SharedProvider(Arc::clone(&provider))),
            executor(),
            AgentConfig::default(),
        );

        let reply = agent.run("Analyze AAPL", &[]).await?;

        assert_eq!(reply.text, "AAPL is in a strong uptrend.");
        assert_eq!(reply.outcome, ReplyOutcome::Final);
        assert_eq!(reply.iterations, 2);
        assert_eq!(reply.messages.len(), 4);
        assert_paired(&reply.messages);

        let results: Vec<_> = reply.messages[2]
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .collect();
        let info: Value = serde_json::from_str(&results[0].payload)?;
        assert_eq!(info["name"], "Apple Inc.");
        let technicals: Value = serde_json::from_str(&results[1].payload)?;
        assert_eq!(technicals["sma_20"], 339.5);

        let requests = reply.tool_requests();
        assert_eq!(requests.len(), 2);

        // the second request carries the first round and offers the full catalog
        let seen = provider.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.len(), 1);
        assert_eq!(seen[1].0.len(), 3);
        assert_eq!(seen[1].1.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_errors_do_not_abort() -> Result<()> {
        let provider = MockProvider::new(vec![
            tool_round(&[
                ("t1", "get_weather", json!({"city": "Paris"})),
                ("t2", "get_stock_data", json!({"symbol": "AAPL"})),
                ("t3", "detect_market_regime", json!({})),
            ]),
            (Message::assistant().with_text("Sorry."), StopReason::EndTurn),
        ]);
        let reply = agent(provider, 10).run("weather?", &[]).await?;

        assert_eq!(reply.outcome, ReplyOutcome::Final);
        assert_paired(&reply.messages);
        let payloads: Vec<Value> = reply.messages[2]
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .map(|r| serde_json::from_str(&r.payload).unwrap())
            .collect();
        assert_eq!(payloads[0], json!({"error": "Unknown tool: get_weather"}));
        assert!(payloads[1]["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid parameters: "));
        assert!(payloads[2]["error"]
            .as_str()
            .unwrap()
            .starts_with("HMM model not found at "));
        Ok(())
    }

    #[tokio::test]
    async fn test_stops_at_iteration_ceiling() -> Result<()> {
        let (message, stop) = tool_round(&[("loop", "get_stock_data", json!({"ticker": "AAPL"}))]);
        let provider = Arc::new(MockProvider::repeating(message, stop));
        let agent = Agent::new(
            Box::new(SharedProvider(Arc::clone(&provider))),
            executor(),
            AgentConfig {
                max_iterations: 3,
                ..Default::default()
            },
        );

        let reply = agent.run("loop forever", &[]).await?;

        assert_eq!(reply.text, MAX_ITERATIONS_TEXT);
        assert_eq!(reply.outcome, ReplyOutcome::MaxIterations);
        assert_eq!(reply.iterations, 3);
        assert_eq!(provider.requests().len(), 3);
        // user message plus one request/response pair per round
        assert_eq!(reply.messages.len(), 1 + 2 * 3);
        assert_paired(&reply.messages);
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpected_stop() -> Result<()> {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("The answer is"),
            StopReason::Other("max_tokens".into()),
        )]);
        let history = vec![
            Message::user().with_text("earlier"),
            Message::assistant().with_text("reply"),
        ];
        let reply = agent(provider, 10).run("go on", &history).await?;

        assert_eq!(reply.text, "Agent stopped unexpectedly: max_tokens");
        assert_eq!(
            reply.outcome,
            ReplyOutcome::UnexpectedStop(StopReason::Other("max_tokens".into()))
        );
        // the truncated assistant message is not kept
        assert_eq!(reply.messages.len(), 3);
        assert_eq!(reply.turn_messages().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_end_turn_with_requests_runs_tools() -> Result<()> {
        let provider = MockProvider::new(vec![
            (
                Message::assistant()
                    .with_tool_request("t1", ToolCall::new("get_company_info", json!({"ticker": "AAPL"}))),
                StopReason::EndTurn,
            ),
            (Message::assistant().with_text("Apple is a tech company."), StopReason::EndTurn),
        ]);
        let reply = agent(provider, 10).run("Who is AAPL?", &[]).await?;

        assert_eq!(reply.outcome, ReplyOutcome::Final);
        assert_eq!(reply.text, "Apple is a tech company.");
        assert_eq!(reply.iterations, 2);
        assert_eq!(reply.messages.len(), 4);
        assert_paired(&reply.messages);
        Ok(())
    }

    #[tokio::test]
    async fn test_truncated_tool_request_is_dropped() -> Result<()> {
        let provider = MockProvider::new(vec![(
            Message::assistant()
                .with_text("Fetching")
                .with_tool_request("t1", ToolCall::new("get_stock_data", json!({"ticker": "AAPL"}))),
            StopReason::Other("max_tokens".into()),
        )]);
        let reply = agent(provider, 10).run("Analyze AAPL", &[]).await?;

        assert_eq!(reply.text, "Agent stopped unexpectedly: max_tokens");
        assert_eq!(
            reply.outcome,
            ReplyOutcome::UnexpectedStop(StopReason::Other("max_tokens".into()))
        );
        // neither the unanswered request nor a response is kept
        assert_eq!(reply.messages.len(), 1);
        assert!(reply.tool_requests().is_empty());
        assert_paired(&reply.messages);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_use_without_requests_is_anomalous() -> Result<()> {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("calling..."),
            StopReason::ToolUse,
        )]);
        let reply = agent(provider, 10).run("hi", &[]).await?;
        assert_eq!(reply.text, "Agent stopped unexpectedly: tool_use");
        assert_eq!(reply.messages.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = MockProvider::new(vec![]);
        let history = vec![Message::user().with_text("earlier")];
        let result = agent(provider, 10).run("hi", &history).await;

        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_parallel_tool_calls_keep_order() -> Result<()> {
        let provider = MockProvider::new(vec![
            tool_round(&[
                ("a", "get_technical_indicators", json!({"ticker": "AAPL"})),
                ("b", "get_company_info", json!({"ticker": "AAPL"})),
            ]),
            (Message::assistant().with_text("done"), StopReason::EndTurn),
        ]);
        let agent = Agent::new(
            Box::new(provider),
            executor(),
            AgentConfig {
                parallel_tool_calls: true,
                ..Default::default()
            },
        );
        let reply = agent.run("Analyze AAPL", &[]).await?;
        assert_paired(&reply.messages);
        Ok(())
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        accumulate(&mut total, &Usage::new(Some(10), Some(5), Some(15)));
        accumulate(&mut total, &Usage::new(Some(20), None, None));
        assert_eq!(total, Usage::new(Some(30), Some(5), Some(15)));
    }

    /// Lets a test keep a handle on the mock after the agent takes ownership
    struct SharedProvider(Arc<MockProvider>);

    #[async_trait::async_trait]
    impl Provider for SharedProvider {
        async fn complete(
            &self,
            system: &str,
            messages: &[Message],
            tools: &[crate::models::tool::Tool],
        ) -> Result<crate::providers::base::ProviderResponse, ProviderError> {
            self.0.complete(system, messages, tools).await
        }
    }
}
