//! Session types: what the server knows about a live connection.
//!
//! A session binds a connection to the room membership it speaks for.
//! The binding is volatile: it lives as long as the socket. The player
//! record it points at lives in the room and outlasts it.

use std::time::Instant;

use imposter_protocol::{ConnectionId, DisplayName, RoomCode};

/// One connection's current room membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Which connection this session belongs to.
    pub connection: ConnectionId,

    /// The room the connection created, joined, or rejoined last.
    pub code: RoomCode,

    /// The display name the connection plays as in that room.
    pub name: DisplayName,

    /// When the binding was made.
    pub bound_at: Instant,
}

impl Session {
    pub fn new(connection: ConnectionId, code: RoomCode, name: DisplayName) -> Self {
        Self {
            connection,
            code,
            name,
            bound_at: Instant::now(),
        }
    }

    /// Whether this session speaks for `name` in room `code`.
    pub fn is_member(&self, code: &RoomCode, name: &DisplayName) -> bool {
        &self.code == code && &self.name == name
    }
}
