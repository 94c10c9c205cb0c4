//! Error type shared by the recorder, store and player.
//! The binary wraps these in `anyhow` with context at the call site.

use std::path::PathBuf;

pub type MacroResult<T> = Result<T, MacroError>;

#[derive(thiserror::Error, Debug)]
pub enum MacroError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("config error: {0}")]
    Config(String),
}

impl MacroError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
