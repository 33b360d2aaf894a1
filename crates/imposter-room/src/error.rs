//! Error types for the room layer.

use std::path::PathBuf;

use imposter_protocol::{DisplayName, ProtocolError, RoomCode};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// Someone in the room already uses this display name.
    #[error("name {name} is already taken in room {code}")]
    NameTaken { code: RoomCode, name: DisplayName },

    /// Every generated code collided with a live room.
    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// The code generator produced an invalid code.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A question file could not be read.
    #[error("cannot read questions from {path}: {source}")]
    ContentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A question file is not a JSON array of pairs.
    #[error("malformed question file: {0}")]
    ContentFormat(#[source] serde_json::Error),

    /// A question source has no pairs at all.
    #[error("question deck is empty")]
    EmptyDeck,
}
