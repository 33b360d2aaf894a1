//! # Imposter
//!
//! Real-time server for the Imposter party game.
//!
//! Players gather in a room identified by a short code. The host starts
//! rounds; each round every player privately receives a question, except
//! one secretly chosen imposter who receives a look-alike question. The
//! host then reveals the question everyone else was answering.
//!
//! This crate ties the layers together:
//!
//! ```text
//! imposter-transport  (WebSocket frames)
//!     ↕
//! imposter-protocol   (Envelope<ClientEvent> / Envelope<ServerEvent>)
//!     ↕
//! imposter-session    (connection bindings, rejoin)
//!     ↕
//! imposter-room       (registry, round state machine)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imposter::prelude::*;
//!
//! # async fn start() -> Result<(), ImposterError> {
//! let server = ImposterServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod server;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::ImposterError;
pub use gateway::{Gateway, OutboundRx};
pub use server::{ImposterServer, ImposterServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{ImposterError, ImposterServer, ImposterServerBuilder, ServerConfig};
    pub use imposter_protocol::{
        Assignment, ClientEvent, DisplayName, Envelope, Role, RoomCode, ServerEvent,
    };
    pub use imposter_room::{
        CodeGenerator, QuestionDeck, QuestionPair, QuestionSource, RoomConfig,
    };
}
