//! Connection sessions for the Imposter server.
//!
//! This crate handles the volatile half of a player's identity:
//!
//! 1. **Session tracking**: which live connection speaks for which room
//!    member ([`SessionManager`])
//! 2. **Rejoin**: moving a member whose socket dropped onto a new
//!    connection and replaying what they missed ([`rejoin`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← resolves room broadcasts through session bindings
//!     ↕
//! Session Layer (this crate)  ← connection ↔ (room, display name)
//!     ↕
//! Room Layer (below)  ← durable player records, rounds, assignments
//! ```

mod error;
mod manager;
mod resolver;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use resolver::rejoin;
pub use session::Session;
