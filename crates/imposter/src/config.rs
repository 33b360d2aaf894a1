//! Server configuration and its environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use imposter_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::ImposterError;

/// Port used when neither `PORT` nor `IMPOSTER_BIND` is set.
pub const DEFAULT_PORT: u16 = 3000;

/// Everything the server needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed. Its player
    /// record stays in the room for a later rejoin.
    pub connection_idle_timeout: Duration,

    /// JSON question file. `None` uses the built-in deck.
    pub questions_path: Option<PathBuf>,

    /// How often the idle-room sweep runs when
    /// [`RoomConfig::idle_room_ttl`] is set.
    pub eviction_interval: Duration,

    /// Seeds imposter and question selection for reproducible games.
    pub rng_seed: Option<u64>,

    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            connection_idle_timeout: Duration::from_secs(120),
            questions_path: None,
            eviction_interval: Duration::from_secs(60),
            rng_seed: None,
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    ///
    /// | variable | effect |
    /// |---|---|
    /// | `PORT` | bind `0.0.0.0:$PORT` |
    /// | `IMPOSTER_BIND` | full bind address, wins over `PORT` |
    /// | `IMPOSTER_QUESTIONS` | path of a JSON question file |
    /// | `IMPOSTER_IDLE_TIMEOUT_SECS` | connection idle timeout |
    /// | `IMPOSTER_ROOM_TTL_SECS` | enable idle-room eviction |
    /// | `IMPOSTER_SEED` | fixed random seed |
    pub fn from_env() -> Result<Self, ImposterError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ImposterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &port)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(addr) = lookup("IMPOSTER_BIND") {
            config.bind_addr = addr;
        }
        if let Some(path) = lookup("IMPOSTER_QUESTIONS") {
            config.questions_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("IMPOSTER_IDLE_TIMEOUT_SECS") {
            config.connection_idle_timeout =
                Duration::from_secs(parse_var("IMPOSTER_IDLE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("IMPOSTER_ROOM_TTL_SECS") {
            config.room.idle_room_ttl = Some(Duration::from_secs(parse_var(
                "IMPOSTER_ROOM_TTL_SECS",
                &secs,
            )?));
        }
        if let Some(seed) = lookup("IMPOSTER_SEED") {
            config.rng_seed = Some(parse_var("IMPOSTER_SEED", &seed)?);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ImposterError> {
    raw.trim()
        .parse()
        .map_err(|_| ImposterError::Config(format!("{key}={raw:?} is not a valid number")))
}
