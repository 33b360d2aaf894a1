//! Per-connection handler: frame decoding and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task multiplexes three things:
//!   1. inbound frames → decode → apply to rooms/sessions → gateway
//!   2. its outbound queue → socket
//!   3. an idle timer, reset by every inbound frame
//!
//! An event holds the room registry lock from the moment it is applied
//! until its outbox is queued, so events touching the same room never
//! interleave.

use std::sync::Arc;
use std::time::Instant;

use imposter_protocol::{
    ClientEvent, Codec, ConnectionId, Envelope, Outbox, Recipient, ServerEvent,
};
use imposter_room::{RoomError, RoomRegistry};
use imposter_session::{SessionManager, rejoin};
use imposter_transport::{Connection, WebSocketConnection};
use serde::Deserialize;

use crate::ImposterError;
use crate::server::ServerState;

/// Drop guard that forgets a connection's binding and outbound queue when
/// the handler exits.
///
/// The room's player record is left alone so the player can rejoin. Since
/// `Drop` is synchronous, we spawn a fire-and-forget task for the async
/// locks.
struct ConnectionGuard<C: Codec + Send + Sync + 'static> {
    connection: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec + Send + Sync + 'static> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            if let Err(e) = sessions.disconnect(connection) {
                tracing::debug!(%connection, error = %e, "no binding to release");
            }
            state.gateway.lock().await.unregister(connection);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ImposterError>
where
    C: Codec + Send + Sync + 'static,
{
    let connection = conn.id();
    let start = Instant::now();
    tracing::debug!(%connection, peer = %conn.peer_addr(), "handling new connection");

    let mut outbound = state.gateway.lock().await.register(connection);
    let _guard = ConnectionGuard {
        connection,
        state: Arc::clone(&state),
    };

    let timeout = state.config.connection_idle_timeout;
    let idle = tokio::time::sleep(timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%connection, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%connection, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + timeout);
                handle_frame(&state, connection, &data, &start).await?;
            }
            Some(text) = outbound.recv() => {
                conn.send(&text).await?;
            }
            () = &mut idle => {
                tracing::info!(%connection, ?timeout, "connection idle, closing");
                if let Err(e) = conn.close().await {
                    tracing::debug!(%connection, error = %e, "close failed");
                }
                break;
            }
        }
    }

    // _guard drops here → binding and queue are released.
    Ok(())
}

/// Just enough of an envelope to answer a frame whose payload is invalid.
#[derive(Deserialize)]
struct RequestSeq {
    seq: u64,
}

/// Decodes one inbound frame, applies it, and queues everything it caused.
async fn handle_frame<C>(
    state: &ServerState<C>,
    connection: ConnectionId,
    data: &[u8],
    start: &Instant,
) -> Result<(), ImposterError>
where
    C: Codec,
{
    let envelope: Envelope<ClientEvent> = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%connection, error = %e, "failed to decode envelope");
            let event = ServerEvent::Error {
                code: 400,
                message: e.to_string(),
            };
            let mut gateway = state.gateway.lock().await;
            match state.codec.decode::<RequestSeq>(data) {
                Ok(request) => gateway.reply(connection, request.seq, &event)?,
                Err(_) => gateway.send(connection, &event)?,
            }
            return Ok(());
        }
    };

    let seq = envelope.seq;
    tracing::debug!(%connection, seq, event = envelope.payload.name(), "event received");

    let mut rooms = state.rooms.lock().await;
    let mut sessions = state.sessions.lock().await;
    let response = apply_event(
        &mut rooms,
        &mut sessions,
        connection,
        envelope.payload,
        millis_since(start),
    );

    let mut gateway = state.gateway.lock().await;
    if let Some(reply) = &response.reply {
        gateway.reply(connection, seq, reply)?;
    }
    gateway.dispatch(&sessions, response.outbox)?;
    Ok(())
}

/// What one client event produced.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Response {
    /// Direct answer to the request, sent with `replyTo` set.
    pub(crate) reply: Option<ServerEvent>,
    /// Everything else, delivered after the reply.
    pub(crate) outbox: Outbox,
}

impl Response {
    fn reply(event: ServerEvent) -> Self {
        Self {
            reply: Some(event),
            outbox: Vec::new(),
        }
    }

    fn events(outbox: Outbox) -> Self {
        Self {
            reply: None,
            outbox,
        }
    }
}

/// Applies one client event to the room registry and session bindings.
///
/// `uptime_ms` is the connection's age, echoed in `pong`.
pub(crate) fn apply_event(
    rooms: &mut RoomRegistry,
    sessions: &mut SessionManager,
    connection: ConnectionId,
    event: ClientEvent,
    uptime_ms: u64,
) -> Response {
    match event {
        ClientEvent::CreateGame { .. } if seated(sessions, connection) => {
            tracing::debug!(%connection, "create from seated connection refused");
            Response::reply(ServerEvent::Error {
                code: 409,
                message: ALREADY_SEATED.to_string(),
            })
        }
        ClientEvent::CreateGame { name } => match rooms.create_room(connection, name.clone()) {
            Ok((code, outbox)) => {
                sessions.bind(connection, code.clone(), name);
                Response {
                    reply: Some(ServerEvent::GameCreated { code }),
                    outbox,
                }
            }
            Err(e) => {
                tracing::warn!(%connection, error = %e, "room creation failed");
                let code = match &e {
                    RoomError::CodeSpaceExhausted(_) => 503,
                    _ => 500,
                };
                Response::reply(ServerEvent::Error {
                    code,
                    message: e.to_string(),
                })
            }
        },

        ClientEvent::JoinGame { code, .. } if seated(sessions, connection) => {
            tracing::debug!(%connection, %code, "join from seated connection refused");
            Response::reply(ServerEvent::JoinResult {
                success: false,
                message: Some(ALREADY_SEATED.to_string()),
            })
        }
        ClientEvent::JoinGame { code, name } => {
            match rooms.join_room(&code, connection, name.clone()) {
                Ok(outbox) => {
                    sessions.bind(connection, code, name);
                    Response {
                        reply: Some(ServerEvent::JoinResult {
                            success: true,
                            message: None,
                        }),
                        outbox,
                    }
                }
                Err(e) => {
                    tracing::debug!(%connection, %code, %name, error = %e, "join refused");
                    Response::reply(ServerEvent::JoinResult {
                        success: false,
                        message: Some(join_failure_message(&e)),
                    })
                }
            }
        }

        ClientEvent::StartGame { code } | ClientEvent::NextRound { code } => {
            Response::events(rooms.start_round(&code, connection))
        }

        ClientEvent::RevealPlayerQuestion { code } => {
            Response::events(rooms.reveal_question(&code, connection))
        }

        ClientEvent::RejoinGame { code, name }
            if sessions
                .get(&connection)
                .is_some_and(|session| !session.is_member(&code, &name)) =>
        {
            tracing::debug!(%connection, %code, %name, "rejoin as another member refused");
            Response::events(vec![(
                Recipient::Connection(connection),
                ServerEvent::RejoinFailed,
            )])
        }
        ClientEvent::RejoinGame { code, name } => {
            match rejoin(rooms, sessions, &code, &name, connection) {
                Ok(outbox) => Response::events(outbox),
                Err(e) => {
                    tracing::debug!(%connection, error = %e, "rejoin refused");
                    Response::events(vec![(
                        Recipient::Connection(connection),
                        ServerEvent::RejoinFailed,
                    )])
                }
            }
        }

        ClientEvent::CheckRevealStatus { code } => {
            Response::reply(ServerEvent::RevealStatus(rooms.reveal_status(&code)))
        }

        ClientEvent::Ping { client_time } => Response::reply(ServerEvent::Pong {
            client_time,
            server_time: uptime_ms,
        }),
    }
}

const ALREADY_SEATED: &str = "Already in a game.";

/// A connection speaks for at most one room member.
fn seated(sessions: &SessionManager, connection: ConnectionId) -> bool {
    sessions.get(&connection).is_some()
}

fn join_failure_message(error: &RoomError) -> String {
    match error {
        RoomError::NotFound(_) => "Game not found.".to_string(),
        RoomError::NameTaken { .. } => "Name already taken.".to_string(),
        other => other.to_string(),
    }
}

fn millis_since(start: &Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use imposter_protocol::{DisplayName, ProtocolError, Role, RoomCode};
    use imposter_room::{CodeGenerator, QuestionDeck, QuestionPair, RoomConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    struct ScriptedCodes(VecDeque<&'static str>);

    impl CodeGenerator for ScriptedCodes {
        fn next_code(&mut self) -> Result<RoomCode, ProtocolError> {
            RoomCode::parse(self.0.pop_front().unwrap_or("WOLF7"))
        }
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code(raw: &str) -> RoomCode {
        RoomCode::parse(raw).unwrap()
    }

    fn name(raw: &str) -> DisplayName {
        DisplayName::parse(raw).unwrap()
    }

    fn fixture(codes: &[&'static str]) -> (RoomRegistry, SessionManager) {
        let deck = QuestionDeck::new(vec![
            QuestionPair::new("fruit?", "vegetable?"),
            QuestionPair::new("pet?", "wild animal?"),
        ])
        .unwrap();
        let rooms = RoomRegistry::with_parts(
            RoomConfig::default(),
            Arc::new(deck),
            Box::new(ScriptedCodes(codes.iter().copied().collect())),
            StdRng::seed_from_u64(1),
        );
        (rooms, SessionManager::new())
    }

    fn apply(
        rooms: &mut RoomRegistry,
        sessions: &mut SessionManager,
        connection: u64,
        event: ClientEvent,
    ) -> Response {
        apply_event(rooms, sessions, conn(connection), event, 0)
    }

    // =====================================================================
    // createGame / joinGame
    // =====================================================================

    #[test]
    fn test_create_replies_with_code_and_binds_creator() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        let response = apply(
            &mut rooms,
            &mut sessions,
            1,
            ClientEvent::CreateGame { name: name("Alice") },
        );

        assert_eq!(
            response.reply,
            Some(ServerEvent::GameCreated { code: code("WOLF7") })
        );
        assert_eq!(response.outbox.len(), 1);
        assert_eq!(sessions.members(&code("WOLF7")), vec![conn(1)]);
    }

    #[test]
    fn test_create_with_no_free_code_is_503() {
        let (mut rooms, mut sessions) = fixture(&[]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });

        let response = apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::CreateGame { name: name("Bob") },
        );
        assert!(matches!(
            response.reply,
            Some(ServerEvent::Error { code: 503, .. })
        ));
        assert!(sessions.get(&conn(2)).is_none());
    }

    #[test]
    fn test_join_unknown_room_reports_not_found() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        let response = apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("NOPE1"),
                name: name("Bob"),
            },
        );
        assert_eq!(
            response.reply,
            Some(ServerEvent::JoinResult {
                success: false,
                message: Some("Game not found.".into()),
            })
        );
        assert!(response.outbox.is_empty());
    }

    #[test]
    fn test_join_taken_name_reports_failure_without_binding() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });

        let response = apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Alice"),
            },
        );
        assert!(matches!(
            response.reply,
            Some(ServerEvent::JoinResult { success: false, .. })
        ));
        assert!(sessions.get(&conn(2)).is_none());
    }

    // =====================================================================
    // Rounds
    // =====================================================================

    #[test]
    fn test_start_and_next_round_behave_alike() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });
        apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );

        let first = apply(&mut rooms, &mut sessions, 1, ClientEvent::StartGame { code: code("WOLF7") });
        let second = apply(&mut rooms, &mut sessions, 1, ClientEvent::NextRound { code: code("WOLF7") });
        let third = apply(&mut rooms, &mut sessions, 1, ClientEvent::NextRound { code: code("WOLF7") });

        assert!(first.reply.is_none());
        assert!(first.outbox.contains(&(
            Recipient::Connection(conn(1)),
            ServerEvent::RoundNumberUpdate(1)
        )));
        assert!(second.outbox.contains(&(
            Recipient::Connection(conn(1)),
            ServerEvent::RoundNumberUpdate(2)
        )));
        assert_eq!(
            third.outbox,
            vec![(Recipient::Room(code("WOLF7")), ServerEvent::NoMoreQuestions)]
        );
    }

    #[test]
    fn test_reveal_status_reply() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });
        apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        apply(&mut rooms, &mut sessions, 1, ClientEvent::StartGame { code: code("WOLF7") });

        let check = ClientEvent::CheckRevealStatus { code: code("WOLF7") };
        assert_eq!(
            apply(&mut rooms, &mut sessions, 2, check.clone()).reply,
            Some(ServerEvent::RevealStatus(false))
        );
        apply(
            &mut rooms,
            &mut sessions,
            1,
            ClientEvent::RevealPlayerQuestion { code: code("WOLF7") },
        );
        assert_eq!(
            apply(&mut rooms, &mut sessions, 2, check).reply,
            Some(ServerEvent::RevealStatus(true))
        );
    }

    // =====================================================================
    // One seat per connection, host-only reveal
    // =====================================================================

    /// WOLF7 with Alice hosting on conn 1 and Bob on conn 2, round 1 dealt.
    fn started_wolf7() -> (RoomRegistry, SessionManager) {
        let (mut rooms, mut sessions) = fixture(&["WOLF7", "SECND"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });
        apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        apply(&mut rooms, &mut sessions, 1, ClientEvent::StartGame { code: code("WOLF7") });
        (rooms, sessions)
    }

    #[test]
    fn test_seated_connection_cannot_join_second_name() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });

        let response = apply(
            &mut rooms,
            &mut sessions,
            1,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Mallory"),
            },
        );
        assert_eq!(
            response,
            Response::reply(ServerEvent::JoinResult {
                success: false,
                message: Some("Already in a game.".into()),
            })
        );
        let room = rooms.lookup(&code("WOLF7")).unwrap();
        assert_eq!(room.player_count(), 1);
        assert!(room.player(&name("Mallory")).is_none());
    }

    #[test]
    fn test_seated_connection_cannot_create_second_room() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7", "SECND"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });

        let response = apply(
            &mut rooms,
            &mut sessions,
            1,
            ClientEvent::CreateGame { name: name("Alice") },
        );
        assert!(matches!(
            response.reply,
            Some(ServerEvent::Error { code: 409, .. })
        ));
        assert_eq!(rooms.room_count(), 1);
        assert!(sessions.get(&conn(1)).unwrap().is_member(&code("WOLF7"), &name("Alice")));
    }

    #[test]
    fn test_seated_connection_cannot_rejoin_as_someone_else() {
        let (mut rooms, mut sessions) = started_wolf7();

        let response = apply(
            &mut rooms,
            &mut sessions,
            1,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        assert_eq!(
            response.outbox,
            vec![(Recipient::Connection(conn(1)), ServerEvent::RejoinFailed)]
        );
        let room = rooms.lookup(&code("WOLF7")).unwrap();
        assert_eq!(room.player(&name("Bob")).unwrap().connection, conn(2));
    }

    #[test]
    fn test_creator_keeps_host_across_rejoins() {
        let (mut rooms, mut sessions) = started_wolf7();

        // Bob reconnecting never picks up host status.
        let bob = apply(
            &mut rooms,
            &mut sessions,
            5,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        assert!(matches!(
            bob.outbox[0].1,
            ServerEvent::RejoinSuccess { is_host: false, .. }
        ));

        let alice = apply(
            &mut rooms,
            &mut sessions,
            6,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Alice"),
            },
        );
        assert!(matches!(
            alice.outbox[0].1,
            ServerEvent::RejoinSuccess { is_host: true, .. }
        ));
        let next = apply(&mut rooms, &mut sessions, 6, ClientEvent::NextRound { code: code("WOLF7") });
        assert!(next.outbox.contains(&(
            Recipient::Connection(conn(6)),
            ServerEvent::RoundNumberUpdate(2)
        )));
    }

    #[test]
    fn test_reveal_from_non_host_or_outsider_is_absorbed() {
        let (mut rooms, mut sessions) = started_wolf7();
        let reveal = ClientEvent::RevealPlayerQuestion { code: code("WOLF7") };

        assert_eq!(apply(&mut rooms, &mut sessions, 2, reveal.clone()), Response::default());
        assert_eq!(apply(&mut rooms, &mut sessions, 99, reveal.clone()), Response::default());
        assert!(!rooms.reveal_status(&code("WOLF7")));

        let host = apply(&mut rooms, &mut sessions, 1, reveal);
        assert_eq!(host.outbox.len(), 1);
        assert!(rooms.reveal_status(&code("WOLF7")));
    }

    // =====================================================================
    // Rejoin and keep-alive
    // =====================================================================

    #[test]
    fn test_rejoin_failure_is_targeted() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        let response = apply(
            &mut rooms,
            &mut sessions,
            5,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Ghost"),
            },
        );
        assert_eq!(
            response,
            Response::events(vec![(
                Recipient::Connection(conn(5)),
                ServerEvent::RejoinFailed
            )])
        );
    }

    #[test]
    fn test_rejoin_replays_assignment() {
        let (mut rooms, mut sessions) = fixture(&["WOLF7"]);
        apply(&mut rooms, &mut sessions, 1, ClientEvent::CreateGame { name: name("Alice") });
        apply(
            &mut rooms,
            &mut sessions,
            2,
            ClientEvent::JoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        apply(&mut rooms, &mut sessions, 1, ClientEvent::StartGame { code: code("WOLF7") });

        let response = apply(
            &mut rooms,
            &mut sessions,
            9,
            ClientEvent::RejoinGame {
                code: code("WOLF7"),
                name: name("Bob"),
            },
        );
        let replayed = response.outbox.iter().find_map(|(to, ev)| match ev {
            ServerEvent::RoleAssignment(a) if *to == Recipient::Connection(conn(9)) => Some(a),
            _ => None,
        });
        let replayed = replayed.expect("assignment replayed to the new connection");
        assert_eq!(replayed.name, name("Bob"));
        assert!(matches!(replayed.role, Role::Imposter | Role::Innocent));
    }

    #[test]
    fn test_ping_echoes_client_time() {
        let (mut rooms, mut sessions) = fixture(&[]);
        let response = apply_event(
            &mut rooms,
            &mut sessions,
            conn(1),
            ClientEvent::Ping { client_time: 1234 },
            77,
        );
        assert_eq!(
            response.reply,
            Some(ServerEvent::Pong {
                client_time: 1234,
                server_time: 77
            })
        );
    }

    #[test]
    fn test_join_failure_messages() {
        assert_eq!(
            join_failure_message(&RoomError::NotFound(code("AB"))),
            "Game not found."
        );
        assert_eq!(
            join_failure_message(&RoomError::NameTaken {
                code: code("AB"),
                name: name("Alice"),
            }),
            "Name already taken."
        );
    }
}
