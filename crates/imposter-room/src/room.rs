//! A single room: membership, rounds, and reveals.
//!
//! `Room` is plain data plus transition methods. It never talks to the
//! network; each mutating method returns the [`Outbox`] of events the
//! transition produced and the caller hands it to the messaging gateway.
//! Requests the room can't honor (wrong host, too few players, nothing to
//! reveal) return an empty outbox and leave the state untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use imposter_protocol::{
    Assignment, ConnectionId, DisplayName, Outbox, PlayerView, Recipient, Role, RoomCode,
    ServerEvent,
};
use rand::Rng;

use crate::{QuestionPair, RoomError, RoomPhase};

/// A member of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// The connection this player was last seen on. Stale after a drop
    /// until the player rejoins.
    pub connection: ConnectionId,
    pub name: DisplayName,
}

/// State of one game room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    /// The creator. Host authority belongs to this name for the room's
    /// whole life, whichever connection it is currently on.
    host_name: DisplayName,
    host: ConnectionId,
    players: HashMap<DisplayName, Player>,
    round: u32,
    current_pair: Option<QuestionPair>,
    used_pairs: HashSet<QuestionPair>,
    /// Replaced wholesale with `current_pair` at every round start.
    assignments: HashMap<DisplayName, Assignment>,
    imposter: Option<DisplayName>,
    revealed: bool,
    started: bool,
    exhausted: bool,
    last_activity: Instant,
}

impl Room {
    /// A new room whose creator is host and sole player.
    pub(crate) fn new(code: RoomCode, host: ConnectionId, host_name: DisplayName) -> Self {
        let mut players = HashMap::new();
        players.insert(
            host_name.clone(),
            Player {
                connection: host,
                name: host_name.clone(),
            },
        );
        Self {
            code,
            host_name,
            host,
            players,
            round: 0,
            current_pair: None,
            used_pairs: HashSet::new(),
            assignments: HashMap::new(),
            imposter: None,
            revealed: false,
            started: false,
            exhausted: false,
            last_activity: Instant::now(),
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// The connection currently allowed to start rounds.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// The player who created the room.
    pub fn host_name(&self) -> &DisplayName {
        &self.host_name
    }

    pub fn phase(&self) -> RoomPhase {
        if self.exhausted {
            RoomPhase::Exhausted
        } else if !self.started {
            RoomPhase::Lobby
        } else if self.revealed {
            RoomPhase::Revealed
        } else {
            RoomPhase::RoundActive
        }
    }

    /// The current round number; 0 before the first round.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn current_pair(&self) -> Option<&QuestionPair> {
        self.current_pair.as_ref()
    }

    pub fn used_pairs(&self) -> &HashSet<QuestionPair> {
        &self.used_pairs
    }

    pub fn imposter(&self) -> Option<&DisplayName> {
        self.imposter.as_ref()
    }

    /// The stored assignment for `name` in the current round.
    pub fn assignment(&self, name: &DisplayName) -> Option<&Assignment> {
        self.assignments.get(name)
    }

    pub fn player(&self, name: &DisplayName) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Time since the last state change.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// The roster event clients render the player list from.
    pub fn roster(&self) -> ServerEvent {
        let roster: BTreeMap<DisplayName, PlayerView> = self
            .players
            .values()
            .map(|p| {
                (
                    p.name.clone(),
                    PlayerView {
                        connection_id: p.connection,
                        display_name: p.name.clone(),
                    },
                )
            })
            .collect();
        ServerEvent::PlayerListUpdate(roster)
    }

    // -- Transitions ------------------------------------------------------

    /// Adds a non-host player.
    pub(crate) fn add_player(
        &mut self,
        name: DisplayName,
        connection: ConnectionId,
    ) -> Result<Outbox, RoomError> {
        if self.players.contains_key(&name) {
            return Err(RoomError::NameTaken {
                code: self.code.clone(),
                name,
            });
        }
        self.players
            .insert(name.clone(), Player { connection, name });
        self.touch();
        Ok(vec![(Recipient::Room(self.code.clone()), self.roster())])
    }

    /// Starts the next round if `requester` is the host.
    ///
    /// Draws a pair the room has never seen and an imposter uniformly at
    /// random, then emits one private assignment per player and the new
    /// round number to the host. When every pair in `deck` was already
    /// served the room becomes [`RoomPhase::Exhausted`] and announces
    /// `noMoreQuestions` once; later calls do nothing.
    pub(crate) fn start_round<R: Rng + ?Sized>(
        &mut self,
        requester: ConnectionId,
        deck: &[QuestionPair],
        min_players: usize,
        rng: &mut R,
    ) -> Outbox {
        if requester != self.host {
            tracing::debug!(code = %self.code, %requester, "round start from non-host ignored");
            return Vec::new();
        }
        if !self.phase().can_start_round() {
            tracing::debug!(code = %self.code, "room exhausted, round start ignored");
            return Vec::new();
        }
        if self.players.len() < min_players {
            tracing::debug!(
                code = %self.code,
                players = self.players.len(),
                min_players,
                "not enough players to start a round"
            );
            return Vec::new();
        }

        let unused: Vec<&QuestionPair> = deck
            .iter()
            .filter(|pair| !self.used_pairs.contains(*pair))
            .collect();
        let Some(pair) = pick(&unused, rng).map(|pair| (*pair).clone()) else {
            self.exhausted = true;
            self.touch();
            tracing::info!(code = %self.code, rounds = self.round, "question pairs exhausted");
            return vec![(Recipient::Room(self.code.clone()), ServerEvent::NoMoreQuestions)];
        };

        // Sorted so a seeded rng reproduces the same imposter.
        let mut names: Vec<&DisplayName> = self.players.keys().collect();
        names.sort();
        let Some(imposter) = pick(&names, rng).map(|name| (*name).clone()) else {
            return Vec::new();
        };

        self.used_pairs.insert(pair.clone());
        self.round += 1;
        self.started = true;
        self.revealed = false;
        self.assignments.clear();

        let mut outbox = Vec::with_capacity(self.players.len() + 1);
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        for player in players {
            let role = if player.name == imposter {
                Role::Imposter
            } else {
                Role::Innocent
            };
            let question = match role {
                Role::Imposter => pair.imposter.clone(),
                Role::Innocent => pair.majority.clone(),
            };
            let assignment = Assignment {
                role,
                question,
                player_question: pair.majority.clone(),
                name: player.name.clone(),
            };
            self.assignments
                .insert(player.name.clone(), assignment.clone());
            outbox.push((
                Recipient::Connection(player.connection),
                ServerEvent::RoleAssignment(assignment),
            ));
        }
        outbox.push((
            Recipient::Connection(self.host),
            ServerEvent::RoundNumberUpdate(self.round),
        ));

        tracing::info!(
            code = %self.code,
            round = self.round,
            players = self.players.len(),
            "round started"
        );
        self.imposter = Some(imposter);
        self.current_pair = Some(pair);
        self.touch();
        outbox
    }

    /// Shows the whole room the majority question of the current round if
    /// `requester` is the host.
    ///
    /// Repeating the reveal re-sends the same text. Before the first round
    /// there is nothing to reveal and nothing happens.
    pub(crate) fn reveal(&mut self, requester: ConnectionId) -> Outbox {
        if requester != self.host {
            tracing::debug!(code = %self.code, %requester, "reveal from non-host ignored");
            return Vec::new();
        }
        let Some(pair) = &self.current_pair else {
            tracing::debug!(code = %self.code, "reveal before first round ignored");
            return Vec::new();
        };
        let majority = pair.majority.clone();
        self.revealed = true;
        self.touch();
        tracing::info!(code = %self.code, round = self.round, "question revealed");
        vec![(
            Recipient::Room(self.code.clone()),
            ServerEvent::PlayerQuestionRevealed(majority),
        )]
    }

    /// Moves `name` onto a new connection.
    ///
    /// Returns whether the player is the host, or `None` if nobody by that
    /// name is in the room. Host authority follows the creator's name: when
    /// the creator rebinds, the new connection becomes host.
    pub fn rebind_player(&mut self, name: &DisplayName, connection: ConnectionId) -> Option<bool> {
        let player = self.players.get_mut(name)?;
        let was_host = *name == self.host_name;
        player.connection = connection;
        if was_host {
            self.host = connection;
        }
        self.touch();
        Some(was_host)
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Uniform choice from a slice; `None` when empty.
fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len()))
}
