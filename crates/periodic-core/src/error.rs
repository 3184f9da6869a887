use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
