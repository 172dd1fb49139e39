use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Failure of a single analysis run, or of the startup that precedes it.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("startup error: {0}")]
    Startup(String),
    #[error("io error at {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("video processing failed upstream for {name}")]
    RemoteFailure { name: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditErrorKind {
    Startup,
    Io,
    RemoteFailure,
    Transport,
}

impl AuditError {
    pub fn kind(&self) -> AuditErrorKind {
        match self {
            AuditError::Startup(_) => AuditErrorKind::Startup,
            AuditError::Io { .. } => AuditErrorKind::Io,
            AuditError::RemoteFailure { .. } => AuditErrorKind::RemoteFailure,
            AuditError::Transport(_) => AuditErrorKind::Transport,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AuditError::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<ConfigError> for AuditError {
    fn from(error: ConfigError) -> Self {
        AuditError::Startup(error.to_string())
    }
}

impl From<reqwest::Error> for AuditError {
    fn from(error: reqwest::Error) -> Self {
        AuditError::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(error: serde_json::Error) -> Self {
        AuditError::Transport(format!("malformed response: {error}"))
    }
}

impl From<url::ParseError> for AuditError {
    fn from(error: url::ParseError) -> Self {
        AuditError::Startup(format!("invalid endpoint url: {error}"))
    }
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_message_mentions_failed() {
        let error = AuditError::RemoteFailure {
            name: "files/abc".into(),
        };
        assert_eq!(error.kind(), AuditErrorKind::RemoteFailure);
        assert!(error.to_string().contains("failed"));
    }

    #[test]
    fn config_errors_become_startup_errors() {
        let error: AuditError = ConfigError::Io {
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
            path: PathBuf::from("configs/trafficmind.toml"),
        }
        .into();
        assert_eq!(error.kind(), AuditErrorKind::Startup);
        assert!(error.to_string().contains("configs/trafficmind.toml"));
    }
}
