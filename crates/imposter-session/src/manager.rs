//! The session manager: tracks which live connection speaks for whom.
//!
//! The gateway uses it to turn a room-wide recipient into the set of
//! connections currently in that room, and the handler uses it to forget a
//! connection when its socket closes.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself. The server keeps it
//! behind a mutex and always takes the room registry lock first.

use std::collections::{BTreeSet, HashMap};

use imposter_protocol::{ConnectionId, DisplayName, RoomCode};

use crate::{Session, SessionError};

/// All live connection bindings.
///
/// ## Lifecycle
///
/// ```text
/// create/join/rejoin ──→ bind() ──→ [bound] ──→ disconnect()
///                           ↑           │
///                           └─(rebind)──┘
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    /// Bindings keyed by connection. A connection is in at most one room.
    sessions: HashMap<ConnectionId, Session>,

    /// Connections per room. Kept in sync with `sessions`.
    rooms: HashMap<RoomCode, BTreeSet<ConnectionId>>,
}

impl SessionManager {
    /// Creates a new, empty session manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `connection` to `name` in room `code`.
    ///
    /// Any previous binding of the same connection is replaced, and any
    /// other connection still speaking for the same member is unbound so
    /// room broadcasts reach only the newest connection. Returns the
    /// connections that lost their binding that way.
    pub fn bind(
        &mut self,
        connection: ConnectionId,
        code: RoomCode,
        name: DisplayName,
    ) -> Vec<ConnectionId> {
        self.unbind(connection);

        let displaced: Vec<ConnectionId> = self
            .rooms
            .get(&code)
            .into_iter()
            .flatten()
            .filter(|other| {
                self.sessions
                    .get(*other)
                    .is_some_and(|s| s.is_member(&code, &name))
            })
            .copied()
            .collect();
        for other in &displaced {
            self.unbind(*other);
            tracing::debug!(%code, %name, displaced = %other, "member moved to a new connection");
        }

        self.rooms.entry(code.clone()).or_default().insert(connection);
        self.sessions
            .insert(connection, Session::new(connection, code.clone(), name.clone()));
        tracing::debug!(%connection, %code, %name, "session bound");
        displaced
    }

    /// Forgets a connection whose socket closed.
    ///
    /// The player record in the room is untouched; the player can rejoin
    /// from a new connection.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection never bound.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Result<Session, SessionError> {
        let session = self
            .unbind(connection)
            .ok_or(SessionError::NotFound(connection))?;
        tracing::info!(
            %connection,
            code = %session.code,
            name = %session.name,
            "connection left, player kept for rejoin"
        );
        Ok(session)
    }

    fn unbind(&mut self, connection: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&connection)?;
        if let Some(members) = self.rooms.get_mut(&session.code) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(&session.code);
            }
        }
        Some(session)
    }

    /// Looks up the binding of a connection.
    pub fn get(&self, connection: &ConnectionId) -> Option<&Session> {
        self.sessions.get(connection)
    }

    /// Connections currently bound to room `code`, in ascending order.
    pub fn members(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.rooms
            .get(code)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drops every binding into `code`, e.g. after the room was evicted.
    pub fn forget_room(&mut self, code: &RoomCode) -> Vec<ConnectionId> {
        let members: Vec<ConnectionId> = self
            .rooms
            .remove(code)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for connection in &members {
            self.sessions.remove(connection);
        }
        members
    }

    /// Returns the number of bound connections.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
