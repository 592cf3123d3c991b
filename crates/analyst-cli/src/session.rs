use analyst::agent::{Agent, ReplyOutcome};
use analyst::models::message::Message;
use anyhow::Result;

use crate::prompt::{InputType, Prompt};

mod interrupt;

use interrupt::Interrupts;

/// Interactive conversation: the history lives here and only grows when a
/// turn completes
pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    messages: Vec<Message>,
    interrupts: Interrupts,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<impl Prompt + 'a>) -> Self {
        Session {
            agent,
            prompt,
            messages: Vec::new(),
            interrupts: Interrupts::install(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.analyst_ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process(&content).await;
                    }
                }
                InputType::Clear => {
                    self.messages.clear();
                    self.prompt.render(raw_message("Conversation cleared."));
                }
                InputType::Exit => break,
                _ => continue,
            }
        }

        self.prompt.close();
        Ok(())
    }

    async fn process(&mut self, content: &str) {
        self.prompt.show_busy();

        // the turn future borrows the history; it is dropped before anything is rendered
        let outcome = self
            .interrupts
            .during(self.agent.run(content, &self.messages))
            .await;
        self.prompt.hide_busy();

        match outcome {
            Some(Ok(reply)) => {
                for message in reply.turn_messages().iter().skip(1) {
                    self.prompt.render(Box::new(message.clone()));
                }
                if reply.outcome != ReplyOutcome::Final {
                    self.prompt.render(raw_message(&reply.text));
                }
                self.messages = reply.messages;
            }
            Some(Err(e)) => self.prompt.render_error(&format!("API Error: {}", e)),
            None => self
                .prompt
                .render(raw_message("Interrupted. Type 'quit' to exit.")),
        }
    }
}

fn raw_message(content: &str) -> Box<Message> {
    Box::new(Message::assistant().with_text(content))
}
