//! Room configuration and round lifecycle phases.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Players required before the host can start a round. Below this,
    /// start requests are ignored.
    pub min_players: usize,

    /// Length of generated room codes.
    pub code_length: usize,

    /// How many generated codes to try before giving up on a collision.
    pub max_code_attempts: usize,

    /// Rooms idle for at least this long are evicted by
    /// [`RoomRegistry::evict_idle`](crate::RoomRegistry::evict_idle).
    /// `None` keeps rooms until the process exits.
    pub idle_room_ttl: Option<Duration>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            code_length: 5,
            max_code_attempts: 64,
            idle_room_ttl: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its round lifecycle.
///
/// ```text
/// Lobby → RoundActive → Revealed → RoundActive → ... → Exhausted
/// ```
///
/// - **Lobby**: no round has started yet.
/// - **RoundActive**: roles are assigned, reveal pending.
/// - **Revealed**: the host showed the majority question.
/// - **Exhausted**: every question pair was used; terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Lobby,
    RoundActive,
    Revealed,
    Exhausted,
}

impl RoomPhase {
    /// Returns `true` if a new round may still be started.
    pub fn can_start_round(&self) -> bool {
        !matches!(self, Self::Exhausted)
    }

    /// Returns `true` if a round's assignments exist.
    pub fn has_round(&self) -> bool {
        matches!(self, Self::RoundActive | Self::Revealed)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::RoundActive => write!(f, "RoundActive"),
            Self::Revealed => write!(f, "Revealed"),
            Self::Exhausted => write!(f, "Exhausted"),
        }
    }
}
