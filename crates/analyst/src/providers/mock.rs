use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderResponse, StopReason, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<(Message, StopReason)>>>,
    repeat: Option<(Message, StopReason)>,
    requests: Arc<Mutex<Vec<(Vec<Message>, Vec<String>)>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<(Message, StopReason)>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            repeat: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every request with the same response
    pub fn repeating(message: Message, stop_reason: StopReason) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            repeat: Some((message, stop_reason)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Conversations and tool names seen by each request, in call order
    pub fn requests(&self) -> Vec<(Vec<Message>, Vec<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push((
            messages.to_vec(),
            tools.iter().map(|t| t.name.clone()).collect(),
        ));

        let (message, stop_reason) = match &self.repeat {
            Some(response) => response.clone(),
            None => {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    return Err(ProviderError::InvalidResponse(
                        "mock provider has no responses left".to_string(),
                    ));
                }
                responses.remove(0)
            }
        };

        Ok(ProviderResponse {
            message,
            stop_reason,
            usage: Usage::default(),
        })
    }
}
