//! Room registry: creates, tracks, and routes requests to rooms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use imposter_protocol::{ConnectionId, DisplayName, Outbox, Recipient, RoomCode, ServerEvent};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{AlphabetCodes, CodeGenerator, QuestionSource, Room, RoomConfig, RoomError};

/// All live rooms, keyed by code.
///
/// This is the entry point for room operations from higher layers
/// (session resolver, server handler). It owns the question source, the
/// code generator, and the random source rounds are drawn from, so the
/// rooms themselves stay plain data.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    questions: Arc<dyn QuestionSource>,
    codes: Box<dyn CodeGenerator>,
    rng: StdRng,
    config: RoomConfig,
}

impl RoomRegistry {
    /// Creates an empty registry with random codes of
    /// [`RoomConfig::code_length`] characters.
    pub fn new(config: RoomConfig, questions: Arc<dyn QuestionSource>) -> Self {
        let codes = Box::new(AlphabetCodes::new(config.code_length));
        Self::with_parts(config, questions, codes, StdRng::from_os_rng())
    }

    /// Creates an empty registry from explicit parts.
    pub fn with_parts(
        config: RoomConfig,
        questions: Arc<dyn QuestionSource>,
        codes: Box<dyn CodeGenerator>,
        rng: StdRng,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            questions,
            codes,
            rng,
            config,
        }
    }

    /// Creates a room hosted by `host`, who joins it as `name`.
    ///
    /// Returns the new code and the roster broadcast. Generated codes that
    /// collide with a live room are retried up to
    /// [`RoomConfig::max_code_attempts`] times.
    pub fn create_room(
        &mut self,
        host: ConnectionId,
        name: DisplayName,
    ) -> Result<(RoomCode, Outbox), RoomError> {
        let code = self.free_code()?;
        let room = Room::new(code.clone(), host, name.clone());
        let outbox = vec![(Recipient::Room(code.clone()), room.roster())];
        self.rooms.insert(code.clone(), room);
        tracing::info!(%code, %host, %name, "room created");
        Ok((code, outbox))
    }

    fn free_code(&mut self) -> Result<RoomCode, RoomError> {
        let attempts = self.config.max_code_attempts.max(1);
        for _ in 0..attempts {
            let code = self.codes.next_code()?;
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, "room code collision, retrying");
        }
        tracing::warn!(attempts, rooms = self.rooms.len(), "no free room code");
        Err(RoomError::CodeSpaceExhausted(attempts))
    }

    /// Adds `name` on `connection` to the room with `code`.
    ///
    /// Joining a game already in progress is allowed; the newcomer gets an
    /// assignment from the next round on.
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        connection: ConnectionId,
        name: DisplayName,
    ) -> Result<Outbox, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        let outbox = room.add_player(name.clone(), connection)?;
        tracing::info!(%code, %connection, %name, players = room.player_count(), "player joined");
        Ok(outbox)
    }

    /// Starts the next round in `code` on behalf of `requester`.
    ///
    /// Unknown codes and refused requests produce an empty outbox.
    pub fn start_round(&mut self, code: &RoomCode, requester: ConnectionId) -> Outbox {
        let Some(room) = self.rooms.get_mut(code) else {
            tracing::debug!(%code, %requester, "round start for unknown room");
            return Vec::new();
        };
        room.start_round(
            requester,
            self.questions.pairs(),
            self.config.min_players,
            &mut self.rng,
        )
    }

    /// Reveals the current majority question in `code` to the whole room
    /// on behalf of `requester`.
    ///
    /// Unknown codes and requests from anyone but the host produce an
    /// empty outbox.
    pub fn reveal_question(&mut self, code: &RoomCode, requester: ConnectionId) -> Outbox {
        match self.rooms.get_mut(code) {
            Some(room) => room.reveal(requester),
            None => {
                tracing::debug!(%code, %requester, "reveal for unknown room");
                Vec::new()
            }
        }
    }

    /// Whether the current round of `code` has been revealed. Unknown
    /// rooms report `false`.
    pub fn reveal_status(&self, code: &RoomCode) -> bool {
        self.rooms.get(code).is_some_and(Room::is_revealed)
    }

    /// The roster broadcast for `code`, if the room exists.
    pub fn roster(&self, code: &RoomCode) -> Option<(Recipient, ServerEvent)> {
        self.rooms
            .get(code)
            .map(|room| (Recipient::Room(code.clone()), room.roster()))
    }

    pub fn lookup(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn lookup_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Drops every room idle for at least `ttl` and returns their codes.
    pub fn evict_idle(&mut self, ttl: Duration) -> Vec<RoomCode> {
        let stale: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.idle_for() >= ttl)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &stale {
            self.rooms.remove(code);
            tracing::info!(%code, "idle room evicted");
        }
        stale
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all live room codes.
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.rooms.len())
            .field("pairs", &self.questions.pairs().len())
            .field("config", &self.config)
            .finish()
    }
}
