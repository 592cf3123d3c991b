use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable for a dotted settings key, `provider.api_key` ->
/// `ANALYST_PROVIDER__API_KEY`
pub fn to_env_var(key: &str) -> String {
    let path = key
        .split('.')
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join("__");
    format!("ANALYST_{}", path)
}
