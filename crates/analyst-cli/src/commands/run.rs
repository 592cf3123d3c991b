use anyhow::Result;

use crate::configuration::Settings;

/// One headless turn: the answer goes to stdout, provider failures become the
/// process exit status
pub async fn execute(settings: &Settings, message: &str) -> Result<()> {
    let agent = super::session::build_agent(settings)?;
    let reply = agent.run(message, &[]).await?;

    tracing::info!(
        iterations = reply.iterations,
        tool_calls = reply.tool_requests().len(),
        outcome = ?reply.outcome,
        "turn complete"
    );
    println!("{}", reply.text);
    Ok(())
}
