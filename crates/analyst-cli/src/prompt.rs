use analyst::models::message::Message;
use anyhow::Result;

pub mod rustyline;
pub mod thinking;

pub trait Prompt {
    fn render(&mut self, message: Box<Message>);
    fn render_error(&mut self, message: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn analyst_ready(&self) {
        println!();
        println!("Financial research agent ready. Ask about a ticker, the market regime, or recent news.");
        println!("Type /help for commands.");
        println!();
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // only set for messages
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    AskAgain, // nothing to send, prompt again
    Message,
    Clear, // drop the conversation history
    Exit,
    Help,
    ToggleTheme,
}

pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn bat_theme(&self) -> &'static str {
        match self {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

/// Classify a line typed at the prompt. Commands are case-insensitive.
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();
    let command = text.to_ascii_lowercase();
    let input_type = match command.as_str() {
        "" => InputType::AskAgain,
        "quit" | "exit" | "q" | "/exit" | "/quit" => InputType::Exit,
        "clear" | "/clear" => InputType::Clear,
        "/help" | "/?" => InputType::Help,
        "/t" => InputType::ToggleTheme,
        _ => {
            return Input {
                input_type: InputType::Message,
                content: Some(text.to_string()),
            }
        }
    };
    Input {
        input_type,
        content: None,
    }
}
