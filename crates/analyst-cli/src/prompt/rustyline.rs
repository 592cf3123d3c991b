use std::io::{self, Write};

use analyst::models::message::{Message, MessageContent, ToolRequest, ToolResponse};
use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use serde_json::Value;

use super::{parse_input, thinking::get_random_thinking_message, Input, InputType, Prompt, Theme};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30mYou> \x1b[0m";
const MAX_STRING_LENGTH: usize = 40;
const INDENT: &str = "    ";

pub struct RustylinePrompt {
    editor: rustyline::DefaultEditor,
    spinner: cliclack::ProgressBar,
    theme: Theme,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: rustyline::DefaultEditor::new()?,
            spinner: spinner(),
            theme: Theme::Dark,
        })
    }

    fn toggle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Light => {
                println!("Switching to Dark theme");
                Theme::Dark
            }
            Theme::Dark => {
                println!("Switching to Light theme");
                Theme::Light
            }
        };
    }
}

fn print_help() {
    println!("Commands:");
    println!("quit | exit | q | /exit - Leave the session");
    println!("clear - Start a fresh conversation");
    println!("/t - Toggle Light/Dark theme");
    println!("/? | /help - Display this help message");
    println!("Ctrl+C - Interrupt the agent while it works (the question is dropped); otherwise exit");
}

fn print_request(request: &ToolRequest) {
    let call = &request.tool_call;
    println!();
    println!(
        "─── {} | {} ──────────────────────────",
        style(&call.name),
        style(&request.id).magenta().dim(),
    );
    print_params(&call.arguments, 0);
    println!();
}

fn print_response(response: &ToolResponse) {
    let failed = serde_json::from_str::<Value>(&response.payload)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string));

    match failed {
        Some(error) => println!("{} {}", style("✗").red(), style(error).red().dim()),
        None => println!(
            "{} {}",
            style("✓").green(),
            style(format!("Got result ({} chars)", response.payload.chars().count())).dim()
        ),
    }
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

/// Tool arguments as an indented `key: value` listing; long strings are elided
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                if val.is_object() || val.is_array() {
                    println!("{}{}:", indent, style(key).dim());
                    print_params(val, depth + 1);
                } else {
                    println!("{}{}: {}", indent, style(key).dim(), styled_scalar(val));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if item.is_object() || item.is_array() {
                    println!("{}-", indent);
                    print_params(item, depth + 1);
                } else {
                    println!("{}- {}", indent, styled_scalar(item));
                }
            }
        }
        scalar => println!("{}{}", indent, styled_scalar(scalar)),
    }
}

fn styled_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > MAX_STRING_LENGTH => {
            style(format!("[{} chars]", s.chars().count())).dim().to_string()
        }
        Value::String(s) => style(s).green().to_string(),
        Value::Null => style("null").dim().to_string(),
        other => style(other).blue().to_string(),
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, message: Box<Message>) {
        let theme = self.theme.bat_theme();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => print_markdown(&text.text, theme),
                MessageContent::ToolRequest(request) => print_request(request),
                MessageContent::ToolResponse(response) => print_response(response),
            }
        }

        println!();
        let _ = io::stdout().flush();
    }

    fn render_error(&mut self, message: &str) {
        eprintln!("{}", style(message).red().bold());
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner
            .start(format!("{}...", get_random_thinking_message()));
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(line) => line,
            Err(e) => {
                match e {
                    ReadlineError::Interrupted | ReadlineError::Eof => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
        };

        let input = parse_input(&line);
        match input.input_type {
            InputType::Help => print_help(),
            InputType::ToggleTheme => self.toggle_theme(),
            InputType::Message => {
                let _ = self.editor.add_history_entry(line.trim());
                return Ok(input);
            }
            InputType::AskAgain | InputType::Clear | InputType::Exit => return Ok(input),
        }
        Ok(Input {
            input_type: InputType::AskAgain,
            content: None,
        })
    }

    fn close(&self) {
        println!("{}", style("Goodbye!").dim());
    }
}
