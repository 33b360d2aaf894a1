//! Error types for the session layer.

use imposter_protocol::{ConnectionId, DisplayName, RoomCode};

/// Errors that can occur while binding or rebinding connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A rejoin named a room that does not exist (or was evicted).
    #[error("cannot rejoin: room {0} not found")]
    UnknownRoom(RoomCode),

    /// A rejoin named a player who never joined the room.
    #[error("cannot rejoin: no player {name} in room {code}")]
    UnknownPlayer { code: RoomCode, name: DisplayName },

    /// No binding exists for the given connection.
    #[error("no session for {0}")]
    NotFound(ConnectionId),
}
