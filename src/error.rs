use std::time::Duration;

use redis::RedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: RedisError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{command} failed for '{key}': {source}")]
    Command {
        command: &'static str,
        key: String,
        #[source]
        source: RedisError,
    },

    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("error retrieving '{target}': {source}")]
    Scan {
        target: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub(crate) fn command(command: &'static str, key: impl Into<String>, source: RedisError) -> Self {
        StoreError::Command {
            command,
            key: key.into(),
            source,
        }
    }

    pub(crate) fn scan(target: impl Into<String>, source: StoreError) -> Self {
        StoreError::Scan {
            target: target.into(),
            source: Box::new(source),
        }
    }

    /// True when the store rejected the command because the key holds
    /// a value of another type.
    pub fn is_wrong_type(&self) -> bool {
        match self {
            StoreError::Command { source, .. } => source.to_string().contains("WRONGTYPE"),
            StoreError::Scan { source, .. } => source.is_wrong_type(),
            _ => false,
        }
    }

    /// True for failures of the connection itself rather than of a command.
    pub fn is_connection_error(&self) -> bool {
        match self {
            StoreError::Connection { .. } => true,
            StoreError::Command { source, .. } => {
                source.is_io_error() || source.is_connection_dropped() || source.is_connection_refusal()
            }
            StoreError::Scan { source, .. } => source.is_connection_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
