//! Messaging gateway: turns addressed events into frames on the right
//! connections.
//!
//! Every connection handler registers an outbound queue here. Room state
//! transitions produce an [`Outbox`]; the gateway resolves each
//! [`Recipient::Room`] through the session bindings, stamps a per-connection
//! sequence number, encodes once per frame, and queues the text. Sends
//! never wait on the socket: the handler task drains its queue.

use std::collections::HashMap;

use imposter_protocol::{Codec, ConnectionId, Envelope, Outbox, Recipient, ServerEvent};
use imposter_session::SessionManager;
use tokio::sync::mpsc;

use crate::ImposterError;

/// Receiving end of a connection's outbound queue.
pub type OutboundRx = mpsc::UnboundedReceiver<String>;

struct Peer {
    tx: mpsc::UnboundedSender<String>,
    next_seq: u64,
}

/// Outbound queues of every live connection.
pub struct Gateway<C: Codec> {
    peers: HashMap<ConnectionId, Peer>,
    codec: C,
}

impl<C: Codec> Gateway<C> {
    pub fn new(codec: C) -> Self {
        Self {
            peers: HashMap::new(),
            codec,
        }
    }

    /// Opens the outbound queue for a new connection.
    pub fn register(&mut self, connection: ConnectionId) -> OutboundRx {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(connection, Peer { tx, next_seq: 1 });
        rx
    }

    /// Closes a connection's queue. Frames already queued are dropped with it.
    pub fn unregister(&mut self, connection: ConnectionId) {
        self.peers.remove(&connection);
    }

    /// Queues `event` as the answer to request `reply_to` from `connection`.
    pub fn reply(
        &mut self,
        connection: ConnectionId,
        reply_to: u64,
        event: &ServerEvent,
    ) -> Result<(), ImposterError> {
        self.deliver(connection, Some(reply_to), event)
    }

    /// Queues an unsolicited `event` for `connection`.
    pub fn send(&mut self, connection: ConnectionId, event: &ServerEvent) -> Result<(), ImposterError> {
        self.deliver(connection, None, event)
    }

    /// Queues every event of `outbox` in order.
    ///
    /// A room recipient expands to the connections currently bound to that
    /// room; connections without a queue are skipped.
    pub fn dispatch(&mut self, sessions: &SessionManager, outbox: Outbox) -> Result<(), ImposterError> {
        for (recipient, event) in outbox {
            match recipient {
                Recipient::Connection(connection) => self.deliver(connection, None, &event)?,
                Recipient::Room(code) => {
                    let members = sessions.members(&code);
                    tracing::debug!(%code, event = event.name(), members = members.len(), "room broadcast");
                    for connection in members {
                        self.deliver(connection, None, &event)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn deliver(
        &mut self,
        connection: ConnectionId,
        reply_to: Option<u64>,
        event: &ServerEvent,
    ) -> Result<(), ImposterError> {
        let Some(peer) = self.peers.get_mut(&connection) else {
            tracing::debug!(%connection, event = event.name(), "no outbound queue, frame dropped");
            return Ok(());
        };
        let seq = peer.next_seq;
        peer.next_seq += 1;
        let envelope = Envelope {
            seq,
            reply_to,
            payload: event,
        };
        let text = self.codec.encode(&envelope)?;
        if peer.tx.send(text).is_err() {
            tracing::debug!(%connection, "outbound queue closed, frame dropped");
        }
        Ok(())
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use imposter_protocol::{DisplayName, JsonCodec, RoomCode};

    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code(raw: &str) -> RoomCode {
        RoomCode::parse(raw).unwrap()
    }

    fn name(raw: &str) -> DisplayName {
        DisplayName::parse(raw).unwrap()
    }

    fn frame(rx: &mut OutboundRx) -> serde_json::Value {
        let text = rx.try_recv().expect("a queued frame");
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_reply_carries_reply_to_and_seq() {
        let mut gateway = Gateway::new(JsonCodec);
        let mut rx = gateway.register(conn(1));

        gateway
            .reply(conn(1), 7, &ServerEvent::RevealStatus(true))
            .unwrap();

        let value = frame(&mut rx);
        assert_eq!(value["seq"], 1);
        assert_eq!(value["replyTo"], 7);
        assert_eq!(value["payload"]["event"], "revealStatus");
        assert_eq!(value["payload"]["data"], true);
    }

    #[test]
    fn test_seq_counts_per_connection() {
        let mut gateway = Gateway::new(JsonCodec);
        let mut a = gateway.register(conn(1));
        let mut b = gateway.register(conn(2));
        let sessions = SessionManager::new();

        let outbox = vec![
            (Recipient::Connection(conn(1)), ServerEvent::NoMoreQuestions),
            (Recipient::Connection(conn(1)), ServerEvent::NoMoreQuestions),
            (Recipient::Connection(conn(2)), ServerEvent::NoMoreQuestions),
        ];
        gateway.dispatch(&sessions, outbox).unwrap();

        let first = frame(&mut a);
        assert_eq!(first["seq"], 1);
        assert!(first.get("replyTo").is_none());
        assert_eq!(frame(&mut a)["seq"], 2);
        assert_eq!(frame(&mut b)["seq"], 1);
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_room_recipient_reaches_bound_connections_only() {
        let mut gateway = Gateway::new(JsonCodec);
        let mut alice = gateway.register(conn(1));
        let mut bob = gateway.register(conn(2));
        let mut outsider = gateway.register(conn(3));
        let mut sessions = SessionManager::new();
        sessions.bind(conn(1), code("WOLF7"), name("Alice"));
        sessions.bind(conn(2), code("WOLF7"), name("Bob"));
        sessions.bind(conn(3), code("OTHER"), name("Carol"));

        gateway
            .dispatch(
                &sessions,
                vec![(
                    Recipient::Room(code("WOLF7")),
                    ServerEvent::PlayerQuestionRevealed("fruit?".into()),
                )],
            )
            .unwrap();

        assert_eq!(frame(&mut alice)["payload"]["data"], "fruit?");
        assert_eq!(frame(&mut bob)["payload"]["data"], "fruit?");
        assert!(outsider.try_recv().is_err());
    }

    #[test]
    fn test_unregistered_connection_is_skipped() {
        let mut gateway = Gateway::new(JsonCodec);
        let rx = gateway.register(conn(1));
        gateway.unregister(conn(1));
        drop(rx);

        let sessions = SessionManager::new();
        let result = gateway.dispatch(
            &sessions,
            vec![(Recipient::Connection(conn(1)), ServerEvent::RejoinFailed)],
        );
        assert!(result.is_ok());
        assert!(gateway.is_empty());
    }
}
