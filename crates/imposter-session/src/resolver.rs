//! Rejoin resolution: putting a dropped player back on a new connection.
//!
//! Identity is the display name. A client that lost its socket reconnects,
//! names its room and itself, and gets back exactly what it had: its host
//! status, the assignment it was dealt this round, and the reveal if the
//! host already showed it. Nothing is recomputed.

use imposter_protocol::{ConnectionId, DisplayName, Outbox, Recipient, RoomCode, ServerEvent};
use imposter_room::RoomRegistry;

use crate::{SessionError, SessionManager};

/// Rebinds `name` in room `code` to `connection` and builds the replay.
///
/// The outbox holds, in order: `rejoinSuccess` to the new connection, the
/// stored `roleAssignment` if a round is running, `playerQuestionRevealed`
/// if the round was revealed, and the roster broadcast to the room. If the
/// player created the room, host authority moves to the new connection.
///
/// # Errors
/// - [`SessionError::UnknownRoom`]: no room has this code
/// - [`SessionError::UnknownPlayer`]: nobody by that name ever joined it
pub fn rejoin(
    rooms: &mut RoomRegistry,
    sessions: &mut SessionManager,
    code: &RoomCode,
    name: &DisplayName,
    connection: ConnectionId,
) -> Result<Outbox, SessionError> {
    let room = rooms
        .lookup_mut(code)
        .ok_or_else(|| SessionError::UnknownRoom(code.clone()))?;
    let is_host = room
        .rebind_player(name, connection)
        .ok_or_else(|| SessionError::UnknownPlayer {
            code: code.clone(),
            name: name.clone(),
        })?;
    sessions.bind(connection, code.clone(), name.clone());

    let to_player = Recipient::Connection(connection);
    let mut outbox = vec![(
        to_player.clone(),
        ServerEvent::RejoinSuccess {
            name: name.clone(),
            code: code.clone(),
            is_host,
            game_started: room.is_started(),
        },
    )];
    if let Some(assignment) = room.assignment(name) {
        outbox.push((
            to_player.clone(),
            ServerEvent::RoleAssignment(assignment.clone()),
        ));
    }
    if room.is_revealed() {
        if let Some(pair) = room.current_pair() {
            outbox.push((
                to_player,
                ServerEvent::PlayerQuestionRevealed(pair.majority.clone()),
            ));
        }
    }
    outbox.push((Recipient::Room(code.clone()), room.roster()));

    tracing::info!(
        %code,
        %name,
        %connection,
        is_host,
        round = room.round(),
        "player rejoined"
    );
    Ok(outbox)
}
