use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::base::{StopReason, Usage};
use crate::errors::ProviderError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to the Anthropic messages specification
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut blocks = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    // the endpoint rejects empty text blocks
                    if !text.text.is_empty() {
                        blocks.push(json!({
                            "type": "text",
                            "text": text.text,
                        }));
                    }
                }
                MessageContent::ToolRequest(request) => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": request.id,
                        "name": request.tool_call.name,
                        "input": request.tool_call.arguments,
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    blocks.push(json!({
                        "type": "tool_result",
                        "tool_use_id": response.id,
                        "content": response.payload,
                    }));
                }
            }
        }

        if !blocks.is_empty() {
            messages_spec.push(json!({
                "role": message.role.as_str(),
                "content": blocks,
            }));
        }
    }

    messages_spec
}

/// Convert internal Tool format to the Anthropic tool specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !is_valid_tool_name(&tool.name) {
            return Err(ProviderError::InvalidRequest(format!(
                "Tool name '{}' must match [a-zA-Z0-9_-]{{1,64}}",
                tool.name
            )));
        }
        if !tool_names.insert(&tool.name) {
            return Err(ProviderError::InvalidRequest(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema,
        }));
    }

    Ok(result)
}

/// Convert an Anthropic messages response into an assistant Message and its stop reason
pub fn anthropic_response_to_message(
    response: &Value,
) -> Result<(Message, StopReason), ProviderError> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing 'content' array".to_string()))?;

    let mut message = Message::assistant();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or_default();
                message = message.with_text(text);
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse("tool_use block without 'id'".to_string())
                    })?;
                let name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse(format!(
                            "tool_use block {} without 'name'",
                            id
                        ))
                    })?;
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                message = message.with_tool_request(id, ToolCall::new(name, input));
            }
            // thinking and other block kinds carry nothing the loop acts on
            _ => {}
        }
    }

    let stop_reason = response
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(StopReason::from)
        .ok_or_else(|| ProviderError::InvalidResponse("missing 'stop_reason'".to_string()))?;

    Ok((message, stop_reason))
}

pub fn anthropic_usage(response: &Value) -> Usage {
    let usage = response.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);
    let output_tokens = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);
    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    Usage::new(input_tokens, output_tokens, total_tokens)
}

fn is_valid_tool_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap();
    re.is_match(name)
}
