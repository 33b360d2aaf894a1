//! `ImposterServer` builder and server loop.
//!
//! This is the entry point for running an Imposter game server. It ties
//! together all the layers: transport → protocol → session → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use imposter_protocol::{Codec, JsonCodec};
use imposter_room::{
    AlphabetCodes, CodeGenerator, QuestionDeck, QuestionSource, RoomError, RoomRegistry,
};
use imposter_session::SessionManager;
use imposter_transport::{Transport, WebSocketTransport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use crate::gateway::Gateway;
use crate::handler::handle_connection;
use crate::{ImposterError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Lock order is always `rooms` → `sessions` → `gateway`.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) gateway: Mutex<Gateway<C>>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting an Imposter server.
///
/// # Example
///
/// ```rust,ignore
/// use imposter::prelude::*;
///
/// let server = ImposterServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ImposterServerBuilder {
    config: ServerConfig,
    questions: Option<Arc<dyn QuestionSource>>,
    codes: Option<Box<dyn CodeGenerator>>,
}

impl ImposterServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            questions: None,
            codes: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Uses `questions` instead of the configured file or built-in deck.
    pub fn questions(mut self, questions: impl QuestionSource) -> Self {
        self.questions = Some(Arc::new(questions));
        self
    }

    /// Uses `codes` to generate room codes.
    pub fn code_generator(mut self, codes: impl CodeGenerator) -> Self {
        self.codes = Some(Box::new(codes));
        self
    }

    /// Builds the server with the JSON codec and binds the listener.
    pub async fn build(self) -> Result<ImposterServer<JsonCodec>, ImposterError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Builds the server with a custom frame codec and binds the listener.
    pub async fn build_with_codec<C>(self, codec: C) -> Result<ImposterServer<C>, ImposterError>
    where
        C: Codec + Clone + Send + Sync + 'static,
    {
        let config = self.config;

        let questions: Arc<dyn QuestionSource> = match (self.questions, &config.questions_path) {
            (Some(questions), _) => questions,
            (None, Some(path)) => Arc::new(QuestionDeck::from_json_file(path)?),
            (None, None) => Arc::new(QuestionDeck::builtin()),
        };
        if questions.pairs().is_empty() {
            return Err(RoomError::EmptyDeck.into());
        }

        let (rng, code_rng) = match config.rng_seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };
        let codes: Box<dyn CodeGenerator> = match self.codes {
            Some(codes) => codes,
            None => Box::new(AlphabetCodes::with_rng(config.room.code_length, code_rng)),
        };

        let pairs = questions.pairs().len();
        let rooms = RoomRegistry::with_parts(config.room.clone(), questions, codes, rng);
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        tracing::info!(
            pairs,
            seeded = config.rng_seed.is_some(),
            room_ttl = ?config.room.idle_room_ttl,
            "server configured"
        );

        let state = Arc::new(ServerState {
            rooms: Mutex::new(rooms),
            sessions: Mutex::new(SessionManager::new()),
            gateway: Mutex::new(Gateway::new(codec.clone())),
            codec,
            config,
        });

        Ok(ImposterServer { transport, state })
    }
}

impl Default for ImposterServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Imposter game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ImposterServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl ImposterServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ImposterServerBuilder {
        ImposterServerBuilder::new()
    }
}

impl<C> ImposterServer<C>
where
    C: Codec + Clone + Send + Sync + 'static,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ImposterError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task per accepted connection and, when rooms have
    /// an idle TTL, the eviction sweep. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), ImposterError> {
        tracing::info!(addr = %self.local_addr()?, "Imposter server running");

        if let Some(ttl) = self.state.config.room.idle_room_ttl {
            spawn_eviction_sweep(
                Arc::clone(&self.state),
                ttl,
                self.state.config.eviction_interval,
            );
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically drops rooms idle for at least `ttl`, along with the
/// session bindings that pointed into them.
fn spawn_eviction_sweep<C>(state: Arc<ServerState<C>>, ttl: Duration, every: Duration)
where
    C: Codec + Send + Sync + 'static,
{
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let mut rooms = state.rooms.lock().await;
            let evicted = rooms.evict_idle(ttl);
            if evicted.is_empty() {
                continue;
            }
            let mut sessions = state.sessions.lock().await;
            for code in &evicted {
                let unbound = sessions.forget_room(code);
                tracing::debug!(%code, unbound = unbound.len(), "bindings dropped with room");
            }
            tracing::info!(evicted = evicted.len(), live = rooms.room_count(), "idle room sweep");
        }
    });
}
