//! Core protocol types: identities, events, and envelopes.
//!
//! Every event is an adjacently tagged enum variant, so on the wire it looks
//! like the event-name/payload pairs a socket client would emit:
//!
//! ```text
//! { "event": "joinGame", "data": { "code": "WOLF7", "name": "Alice" } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use imposter_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Longest accepted room code, in characters.
pub const MAX_CODE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room's short join code, e.g. `WOLF7`.
///
/// Codes are case-insensitive for players typing them in, so parsing trims
/// and uppercases. Only ASCII letters and digits are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes and validates a user-supplied code.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(ProtocolError::InvalidCode(format!(
                "must be 1-{MAX_CODE_LEN} characters"
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProtocolError::InvalidCode(format!(
                "{code:?} contains characters other than letters and digits"
            )));
        }
        Ok(Self(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player's display name: the stable identity inside a room.
///
/// Surrounding whitespace is trimmed. Comparison is exact, so `alice` and
/// `Alice` are different players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Trims and validates a user-supplied name.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ProtocolError::InvalidName("name is empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ProtocolError::InvalidName(format!(
                "name is longer than {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Round data
// ---------------------------------------------------------------------------

/// Which side of the question pair a player got this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single player holding the odd question.
    Imposter,
    /// Everyone else.
    Innocent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imposter => f.write_str("imposter"),
            Self::Innocent => f.write_str("innocent"),
        }
    }
}

/// One player's assignment for the current round.
///
/// `question` is what this player answers; `player_question` is always the
/// majority question, kept so the reveal can be shown later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub role: Role,
    pub question: String,
    pub player_question: String,
    pub name: DisplayName,
}

/// A roster entry as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub connection_id: ConnectionId,
    pub display_name: DisplayName,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Open a new room with the sender as host. Replied with `gameCreated`.
    CreateGame { name: DisplayName },
    /// Join an existing room. Replied with `joinResult`.
    JoinGame { code: RoomCode, name: DisplayName },
    /// Host only: start the first round.
    StartGame { code: RoomCode },
    /// Host only: start another round.
    NextRound { code: RoomCode },
    /// Host only: show everyone the majority question.
    RevealPlayerQuestion { code: RoomCode },
    /// Re-attach a dropped player to this connection.
    RejoinGame { code: RoomCode, name: DisplayName },
    /// Ask whether the current round was revealed. Replied with `revealStatus`.
    CheckRevealStatus { code: RoomCode },
    /// Keep-alive.
    Ping { client_time: u64 },
}

impl ClientEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "createGame",
            Self::JoinGame { .. } => "joinGame",
            Self::StartGame { .. } => "startGame",
            Self::NextRound { .. } => "nextRound",
            Self::RevealPlayerQuestion { .. } => "revealPlayerQuestion",
            Self::RejoinGame { .. } => "rejoinGame",
            Self::CheckRevealStatus { .. } => "checkRevealStatus",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Everything the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Reply to `createGame`.
    GameCreated { code: RoomCode },
    /// Reply to `joinGame`.
    JoinResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Full roster of a room, keyed by display name.
    PlayerListUpdate(BTreeMap<DisplayName, PlayerView>),
    /// A player's private role and question.
    RoleAssignment(Assignment),
    /// The round that just started. Sent to the host.
    RoundNumberUpdate(u32),
    /// The majority question, shown to the whole room.
    PlayerQuestionRevealed(String),
    /// The room has used every question pair.
    NoMoreQuestions,
    /// A rejoin was accepted.
    RejoinSuccess {
        name: DisplayName,
        code: RoomCode,
        is_host: bool,
        game_started: bool,
    },
    /// A rejoin named an unknown room or player.
    RejoinFailed,
    /// Reply to `checkRevealStatus`.
    RevealStatus(bool),
    /// Reply to `ping`.
    Pong { client_time: u64, server_time: u64 },
    /// The request could not be processed.
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "gameCreated",
            Self::JoinResult { .. } => "joinResult",
            Self::PlayerListUpdate(_) => "playerListUpdate",
            Self::RoleAssignment(_) => "roleAssignment",
            Self::RoundNumberUpdate(_) => "roundNumberUpdate",
            Self::PlayerQuestionRevealed(_) => "playerQuestionRevealed",
            Self::NoMoreQuestions => "noMoreQuestions",
            Self::RejoinSuccess { .. } => "rejoinSuccess",
            Self::RejoinFailed => "rejoinFailed",
            Self::RevealStatus(_) => "revealStatus",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope and routing
// ---------------------------------------------------------------------------

/// The frame wrapper for every event in either direction.
///
/// Each side numbers its own frames with `seq`. A server frame that answers
/// a specific request carries that request's `seq` in `reply_to`, which is
/// how a client awaits the result of `createGame`, `joinGame`, or
/// `checkRevealStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    pub payload: T,
}

impl<T> Envelope<T> {
    /// An unsolicited frame.
    pub fn request(seq: u64, payload: T) -> Self {
        Self {
            seq,
            reply_to: None,
            payload,
        }
    }

    /// A frame answering the request numbered `reply_to`.
    pub fn reply(seq: u64, reply_to: u64, payload: T) -> Self {
        Self {
            seq,
            reply_to: Some(reply_to),
            payload,
        }
    }
}

/// Where the messaging gateway should deliver an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A single connection.
    Connection(ConnectionId),
    /// Every connection currently attached to the room.
    Room(RoomCode),
}

/// Events produced by one state transition, in delivery order.
pub type Outbox = Vec<(Recipient, ServerEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> RoomCode {
        RoomCode::parse(raw).unwrap()
    }

    fn name(raw: &str) -> DisplayName {
        DisplayName::parse(raw).unwrap()
    }

    // =====================================================================
    // RoomCode / DisplayName
    // =====================================================================

    #[test]
    fn test_room_code_parse_normalizes_case_and_whitespace() {
        assert_eq!(code("  wolf7 ").as_str(), "WOLF7");
    }

    #[test]
    fn test_room_code_parse_rejects_bad_input() {
        assert!(RoomCode::parse("").is_err());
        assert!(RoomCode::parse("   ").is_err());
        assert!(RoomCode::parse("AB-CD").is_err());
        assert!(RoomCode::parse(&"A".repeat(MAX_CODE_LEN + 1)).is_err());
    }

    #[test]
    fn test_display_name_trims_but_keeps_case() {
        assert_eq!(name("  Alice ").as_str(), "Alice");
        assert_ne!(name("alice"), name("Alice"));
    }

    #[test]
    fn test_display_name_rejects_blank_and_long() {
        assert!(DisplayName::parse(" \t ").is_err());
        assert!(DisplayName::parse(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(DisplayName::parse(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_room_code_deserialize_validates() {
        let ok: RoomCode = serde_json::from_str(r#""abc12""#).unwrap();
        assert_eq!(ok.as_str(), "ABC12");
        let bad: Result<RoomCode, _> = serde_json::from_str(r#""a b""#);
        assert!(bad.is_err());
    }

    // =====================================================================
    // ClientEvent wire shapes
    // =====================================================================

    #[test]
    fn test_join_game_json_format() {
        let ev = ClientEvent::JoinGame {
            code: code("WOLF7"),
            name: name("Alice"),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "joinGame");
        assert_eq!(json["data"]["code"], "WOLF7");
        assert_eq!(json["data"]["name"], "Alice");
    }

    #[test]
    fn test_client_event_parses_from_browser_shape() {
        let raw = r#"{"event":"rejoinGame","data":{"code":"wolf7","name":"Bob"}}"#;
        let ev: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            ev,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            }
        );
    }

    #[test]
    fn test_ping_field_is_camel_case() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"event":"ping","data":{"clientTime":99}}"#).unwrap();
        assert_eq!(ev, ClientEvent::Ping { client_time: 99 });
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let raw = r#"{"event":"kickPlayer","data":{"code":"WOLF7"}}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerEvent wire shapes
    // =====================================================================

    #[test]
    fn test_role_assignment_json_format() {
        let ev = ServerEvent::RoleAssignment(Assignment {
            role: Role::Imposter,
            question: "Pick a number from 1-100".into(),
            player_question: "How much do your parents love you?".into(),
            name: name("Carol"),
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "roleAssignment");
        assert_eq!(json["data"]["role"], "imposter");
        assert_eq!(json["data"]["question"], "Pick a number from 1-100");
        assert_eq!(
            json["data"]["playerQuestion"],
            "How much do your parents love you?"
        );
        assert_eq!(json["data"]["name"], "Carol");
    }

    #[test]
    fn test_player_list_update_is_keyed_by_name() {
        let mut roster = BTreeMap::new();
        roster.insert(
            name("Alice"),
            PlayerView {
                connection_id: ConnectionId::new(4),
                display_name: name("Alice"),
            },
        );
        let json = serde_json::to_value(ServerEvent::PlayerListUpdate(roster)).unwrap();
        assert_eq!(json["event"], "playerListUpdate");
        assert_eq!(json["data"]["Alice"]["connectionId"], 4);
        assert_eq!(json["data"]["Alice"]["displayName"], "Alice");
    }

    #[test]
    fn test_rejoin_success_json_format() {
        let ev = ServerEvent::RejoinSuccess {
            name: name("Alice"),
            code: code("WOLF7"),
            is_host: true,
            game_started: false,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["data"]["isHost"], true);
        assert_eq!(json["data"]["gameStarted"], false);
    }

    #[test]
    fn test_unit_events_have_no_data() {
        let json = serde_json::to_value(ServerEvent::NoMoreQuestions).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "noMoreQuestions" }));
    }

    #[test]
    fn test_join_result_omits_missing_message() {
        let json = serde_json::to_value(ServerEvent::JoinResult {
            success: true,
            message: None,
        })
        .unwrap();
        assert!(json["data"].get("message").is_none());
    }

    // =====================================================================
    // Envelope
    // =====================================================================

    #[test]
    fn test_reply_envelope_carries_reply_to() {
        let env = Envelope::reply(8, 2, ServerEvent::RevealStatus(true));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["seq"], 8);
        assert_eq!(json["replyTo"], 2);
        assert_eq!(json["payload"]["data"], true);
    }

    #[test]
    fn test_request_envelope_omits_reply_to() {
        let env = Envelope::request(1, ServerEvent::RoundNumberUpdate(3));
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("replyTo").is_none());
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let ev = ServerEvent::PlayerQuestionRevealed("q".into());
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.name());

        let ev = ClientEvent::CheckRevealStatus { code: code("AB") };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.name());
    }
}
