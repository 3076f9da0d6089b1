use rowsource_core::error::InternalError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read report config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse report config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid report config: {0}")]
    Invalid(String),

    #[error("report config rejected: {0}")]
    Core(#[from] InternalError),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
