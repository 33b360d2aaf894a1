//! Wire protocol for the Imposter server.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity types** ([`RoomCode`], [`DisplayName`]): validated at the
//!   boundary so the room state machine never sees a blank name or a
//!   malformed code.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one tagged variant per
//!   event name, wrapped in an [`Envelope`] that carries the request
//!   sequence number used to correlate replies.
//! - **Routing** ([`Recipient`], [`Outbox`]): how the state machine tells
//!   the messaging gateway where each event goes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   frames.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<ClientEvent>) → Room / Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Assignment, ClientEvent, DisplayName, Envelope, MAX_CODE_LEN, MAX_NAME_LEN, Outbox,
    PlayerView, Recipient, Role, RoomCode, ServerEvent,
};

pub use imposter_transport::ConnectionId;
