//! Crate-level error type.

use crate::channel::{ChannelError, DecodeError};
use crate::config::ConfigError;
use crate::io::results::StoreError;

/// Everything that can end a run abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("malformed message on queue \"{queue}\": {source}")]
    Decode {
        queue: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("queue \"{queue}\" ended before the end-of-stream marker")]
    StreamTruncated { queue: String },

    #[error("{task} task failed: {message}")]
    Task { task: &'static str, message: String },
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
