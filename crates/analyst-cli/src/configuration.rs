use crate::error::{to_env_var, ConfigError};
use analyst::agent::DEFAULT_MAX_ITERATIONS;
use analyst::market_data::yahoo::{YahooFinanceConfig, YAHOO_HOST};
use analyst::providers::configs::{
    AnthropicProviderConfig, ANTHROPIC_HOST, ANTHROPIC_MAX_TOKENS, ANTHROPIC_MODEL,
};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    pub max_tokens: i32,
}

impl ProviderSettings {
    pub fn into_config(self) -> AnthropicProviderConfig {
        AnthropicProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub parallel_tool_calls: bool,
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSettings {
    pub host: String,
}

impl MarketSettings {
    pub fn into_config(self) -> YahooFinanceConfig {
        YahooFinanceConfig {
            host: self.host,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegimeSettings {
    model_path: String,
}

impl RegimeSettings {
    /// Model artifact location with `~` and `$VARS` expanded
    pub fn model_path(&self) -> PathBuf {
        match shellexpand::full(&self.model_path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(&self.model_path).as_ref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub agent: AgentSettings,
    pub market: MarketSettings,
    pub regime: RegimeSettings,
}

impl Settings {
    /// Defaults, then the config file, then `ANALYST_*` environment variables.
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.host", ANTHROPIC_HOST)?
            .set_default("provider.model", ANTHROPIC_MODEL)?
            .set_default("provider.max_tokens", ANTHROPIC_MAX_TOKENS)?
            .set_default("agent.max_iterations", DEFAULT_MAX_ITERATIONS as u64)?
            .set_default("agent.parallel_tool_calls", false)?
            .set_default("market.host", YAHOO_HOST)?
            .set_default("regime.model_path", default_model_path())?;

        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            builder = builder.set_default("provider.api_key", api_key)?;
        }

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => match default_config_file() {
                Some(path) => builder.add_source(File::from(path).required(false)),
                None => builder,
            },
        };

        let config = builder
            .add_source(
                Environment::with_prefix("ANALYST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(missing_field_error(err));
            }
        };

        if settings.provider.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            });
        }
        Ok(settings)
    }
}

/// Map "missing field `x`" onto the environment variable that would supply it
fn missing_field_error(err: config::ConfigError) -> ConfigError {
    if let config::ConfigError::NotFound(key) = &err {
        return ConfigError::MissingEnvVar {
            env_var: to_env_var(key),
        };
    }

    let message = err.to_string();
    if !message.starts_with("missing field") {
        return ConfigError::Other(err);
    }
    match message.split('`').nth(1) {
        Some(field) => ConfigError::MissingEnvVar {
            env_var: to_env_var(settings_key(field)),
        },
        None => ConfigError::Other(err),
    }
}

/// Only fields without a default can go missing
fn settings_key(field: &str) -> &str {
    match field {
        "api_key" => "provider.api_key",
        other => other,
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("analyst").join("config.toml"))
}

fn default_model_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("analyst").join("hmm_model.json"))
        .unwrap_or_else(|| PathBuf::from("hmm_model.json"))
        .display()
        .to_string()
}
