use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid file pattern: {0}")]
    Glob(#[from] glob::PatternError),
    #[error("invalid resource address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("invalid interpolation '{input}': {reason}")]
    InvalidInterpolation { input: String, reason: String },
    #[error("invalid module {path}: {}", .problems.join("; "))]
    InvalidModule { path: String, problems: Vec<String> },
}

impl ConfigError {
    pub(crate) fn address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn interpolation(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInterpolation {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn module(path: impl ToString, problem: impl Into<String>) -> Self {
        Self::InvalidModule {
            path: path.to_string(),
            problems: vec![problem.into()],
        }
    }
}
