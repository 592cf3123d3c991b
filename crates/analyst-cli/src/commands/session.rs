use std::sync::Arc;

use analyst::agent::{Agent, AgentConfig};
use analyst::executor::ToolExecutor;
use analyst::market_data::YahooFinance;
use analyst::prompt_template::render_system_prompt;
use analyst::providers::anthropic::AnthropicProvider;
use analyst::registry::default_registry;
use anyhow::{Context, Result};

use crate::configuration::Settings;
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::Session;

/// Wire the live Yahoo Finance source, the tool catalog and the Anthropic
/// provider into an agent
pub fn build_agent(settings: &Settings) -> Result<Agent> {
    let source = YahooFinance::new(settings.market.clone().into_config())
        .context("Failed to create the market data client")?;
    let registry = default_registry(Arc::new(source), settings.regime.model_path())?;

    let system_prompt = render_system_prompt(
        registry.tools(),
        settings.agent.system_prompt_file.as_deref(),
    )
    .context("Failed to render the system prompt")?;

    let provider = AnthropicProvider::new(settings.provider.clone().into_config())?;
    tracing::info!(
        model = provider.model(),
        tools = registry.len(),
        "agent ready"
    );

    Ok(Agent::new(
        Box::new(provider),
        ToolExecutor::new(Arc::new(registry)),
        AgentConfig {
            system_prompt,
            max_iterations: settings.agent.max_iterations,
            parallel_tool_calls: settings.agent.parallel_tool_calls,
        },
    ))
}

pub async fn execute(settings: &Settings) -> Result<()> {
    let agent = build_agent(settings)?;
    let mut session = Session::new(agent, Box::new(RustylinePrompt::new()?));
    session.start().await
}
