//! Unified error type for the Imposter server.

use imposter_protocol::ProtocolError;
use imposter_room::RoomError;
use imposter_session::SessionError;
use imposter_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ImposterError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid name or code).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown room or player on rejoin).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, name taken, content loading).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An environment variable or setting could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}
