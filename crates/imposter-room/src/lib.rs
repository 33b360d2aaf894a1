//! Rooms and rounds for the Imposter server.
//!
//! A room is a lobby identified by a short code. Its creator is the host,
//! the only connection allowed to start rounds. Each round draws a
//! question pair the room has not used yet, secretly picks one imposter,
//! and hands every player a private assignment. The host later reveals
//! the majority question to everyone.
//!
//! Everything here is synchronous and transport-free: operations return an
//! [`Outbox`](imposter_protocol::Outbox) of addressed events and the
//! server decides how to deliver them.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms, routes requests by code
//! - [`Room`]: one room's membership and round state machine
//! - [`RoomPhase`]: lifecycle phase derived from a room's flags
//! - [`QuestionDeck`] / [`QuestionSource`]: where question pairs come from
//! - [`CodeGenerator`] / [`AlphabetCodes`]: where room codes come from

mod codes;
mod config;
mod content;
mod error;
mod registry;
mod room;

pub use codes::{AlphabetCodes, CODE_ALPHABET, CodeGenerator};
pub use config::{RoomConfig, RoomPhase};
pub use content::{QuestionDeck, QuestionPair, QuestionSource};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{Player, Room};
