use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands {
    pub mod run;
    pub mod session;
}
mod configuration;
mod error;
mod prompt;
mod session;

use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about = "Financial research agent", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Anthropic model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Maximum model round-trips per question
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive research session
    #[command(about = "Start an interactive research session")]
    Session,

    /// Answer a single question and exit
    #[command(about = "Answer a single question and exit")]
    Run {
        /// The question to ask
        message: String,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Session);
    match &command {
        Command::Session => init_tracing("warn"),
        Command::Run { .. } => init_tracing("warn,analyst=info"),
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        settings.provider.model = model;
    }
    if let Some(max_iterations) = cli.max_iterations {
        settings.agent.max_iterations = max_iterations;
    }

    match command {
        Command::Session => commands::session::execute(&settings).await,
        Command::Run { message } => commands::run::execute(&settings, &message).await,
    }
}
