use thiserror::Error;

use crate::host::{BufferId, ClientId};

/// Failures reported by host collaborators
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Buffer not found: {0}")]
    BufferNotFound(BufferId),

    #[error("Failed to subscribe to buffer {buffer}: {reason}")]
    Subscribe { buffer: BufferId, reason: String },

    #[error("Client {0} is no longer connected")]
    ClientGone(ClientId),

    #[error("Failed to push configuration to client {client}: {reason}")]
    Push { client: ClientId, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync loop has stopped")]
    Closed,
}
