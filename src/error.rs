//! src/error.rs
//!
//! Defines the library's custom, comprehensive `Error` enum using `thiserror`.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize or deserialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tokio task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("API server error: {0}")]
    ApiServer(#[from] axum::Error),

    #[error("Invalid node parameters: {0}")]
    InvalidParameters(String),

    #[error("No endpoint known for peer {0}")]
    UnknownPeer(String),
}
