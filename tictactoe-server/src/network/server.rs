//! Game Server
//!
//! Accepts TCP connections, runs the TLS and version handshakes in their own
//! tasks, and drives the single dispatch loop that owns the matchmaking queue
//! and is the only place sessions are created.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::game::state::Player;
use crate::network::admission::AdmissionController;
use crate::network::connection::PeerConnection;
use crate::network::handshake::{handshake, HandshakeError};
use crate::network::matchmaking::MatchmakingQueue;
use crate::network::protocol::SERVER_SHUTTING_DOWN;
use crate::network::session::{GameSession, SessionManager};
use crate::network::tls::{TlsConfigError, Transport};
use crate::network::worker::{spawn_peer, OUTGOING_CAPACITY};

/// Handshakes finished but not yet picked up by the dispatch loop.
const VALIDATED_BACKLOG: usize = 64;

/// How long shutdown waits for peers to receive the final notice.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on a single transport plus version handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// TLS material could not be loaded.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] TlsConfigError),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// TLS or plain transport.
    transport: Arc<Transport>,
    /// Bound on active sessions.
    admission: Arc<AdmissionController>,
    /// Live sessions.
    sessions: Arc<SessionManager>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
    /// Queue length as of the last dispatch pass.
    queue_len: AtomicUsize,
}

impl GameServer {
    /// Create a server, loading TLS material unless plaintext is configured.
    pub fn new(config: ServerConfig) -> Result<Self, GameServerError> {
        let transport = Transport::from_config(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server with an explicit transport.
    pub fn with_transport(config: ServerConfig, transport: Transport) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            admission: Arc::new(AdmissionController::new(config.max_sessions)),
            config,
            transport: Arc::new(transport),
            sessions: Arc::new(SessionManager::new()),
            shutdown_tx,
            queue_len: AtomicUsize::new(0),
        }
    }

    /// Bind the configured address and serve until shut down.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve_until(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener until shut down.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.serve_until(listener, shutdown_rx).await
    }

    async fn serve_until(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        info!(
            "Game server v{} listening on {} ({}, max {} sessions)",
            self.config.version,
            listener.local_addr()?,
            if self.transport.is_tls() { "TLS" } else { "plaintext" },
            self.admission.max_sessions()
        );

        let (validated_tx, mut validated_rx) = mpsc::channel::<PeerConnection>(VALIDATED_BACKLOG);
        let mut queue = MatchmakingQueue::new();
        let mut tasks = JoinSet::new();
        let mut handshakes = JoinSet::new();
        let mut at_capacity = false;
        let mut next_id: u64 = 0;

        let mut liveness = tokio::time::interval(self.config.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            next_id += 1;
                            debug!("New connection from {} (#{})", addr, next_id);
                            self.spawn_handshake(&mut handshakes, stream, addr, next_id, validated_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(conn) = validated_rx.recv() => {
                    info!(
                        "Client {} (protocol {}) queued for matchmaking",
                        conn.addr(),
                        conn.version().unwrap_or("unknown")
                    );
                    queue.enqueue(conn);
                    self.pair_waiting(&mut queue, &mut tasks, &mut at_capacity).await;
                }
                _ = self.admission.released() => {
                    self.pair_waiting(&mut queue, &mut tasks, &mut at_capacity).await;
                }
                _ = liveness.tick(), if !queue.is_empty() => {
                    self.pair_waiting(&mut queue, &mut tasks, &mut at_capacity).await;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Peer task failed: {}", e);
                    }
                }
                Some(joined) = handshakes.join_next(), if !handshakes.is_empty() => {
                    if let Err(e) = joined {
                        error!("Handshake task failed: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(listener);
        if !handshakes.is_empty() {
            debug!("Abandoning {} handshakes in progress", handshakes.len());
        }
        handshakes.shutdown().await;
        for conn in queue.drain() {
            conn.close().await;
        }
        self.queue_len.store(0, Ordering::Release);

        let closed = self.sessions.close_all(SERVER_SHUTTING_DOWN).await;
        info!("Closed {} sessions", closed);

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Peers did not finish within {:?}, aborting", SHUTDOWN_GRACE);
        }

        Ok(())
    }

    /// Run the transport and version handshakes off the dispatch loop.
    ///
    /// Peers are queued in the order their handshakes complete, not the
    /// order they connected.
    fn spawn_handshake(
        &self,
        handshakes: &mut JoinSet<()>,
        stream: TcpStream,
        addr: SocketAddr,
        id: u64,
        validated: mpsc::Sender<PeerConnection>,
    ) {
        let transport = self.transport.clone();
        let version = self.config.version.clone();

        handshakes.spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }

            let attempt = handshake(&transport, stream, addr, id, &version);
            let Ok(result) = tokio::time::timeout(HANDSHAKE_TIMEOUT, attempt).await else {
                warn!("Handshake with {} timed out after {:?}", addr, HANDSHAKE_TIMEOUT);
                return;
            };

            match result {
                Ok(conn) => {
                    if validated.send(conn).await.is_err() {
                        debug!("Server stopped before {} was queued", addr);
                    }
                }
                Err(HandshakeError::VersionMismatch { offered }) => {
                    info!(
                        "Rejected {}: version mismatch (offered {:?}, expected {})",
                        addr, offered, version
                    );
                }
                Err(e) => {
                    warn!("Handshake with {} failed: {}", addr, e);
                }
            }
        });
    }

    /// Prune dead waiters, then start sessions while capacity and peers allow.
    async fn pair_waiting(
        &self,
        queue: &mut MatchmakingQueue,
        tasks: &mut JoinSet<()>,
        at_capacity: &mut bool,
    ) {
        let pruned = queue.prune_dead();
        if pruned > 0 {
            debug!("Pruned {} closed connections from the queue", pruned);
        }

        while queue.len() >= 2 {
            if !self.admission.try_acquire() {
                if !*at_capacity {
                    warn!(
                        "Server at maximum capacity ({} sessions), {} waiting",
                        self.admission.max_sessions(),
                        queue.len()
                    );
                    *at_capacity = true;
                }
                break;
            }

            let Some((first, second)) = queue.try_pair() else {
                break;
            };
            self.start_session(first, second, tasks).await;
        }

        if self.admission.try_acquire() {
            *at_capacity = false;
        }
        self.queue_len.store(queue.len(), Ordering::Release);
    }

    /// Create a session for two peers and spawn their tasks.
    async fn start_session(
        &self,
        first: PeerConnection,
        second: PeerConnection,
        tasks: &mut JoinSet<()>,
    ) {
        let slot = self.admission.admit();
        let id = self.sessions.allocate_id().await;

        info!(sid = %id, "Pairing {} with {}", first.addr(), second.addr());

        let (tx1, rx1) = mpsc::channel(OUTGOING_CAPACITY);
        let (tx2, rx2) = mpsc::channel(OUTGOING_CAPACITY);
        let session = Arc::new(GameSession::new(id, [tx1, tx2], slot));

        self.sessions.register(session.clone()).await;
        session.start().await;

        for (player, conn, rx) in [(Player::One, first, rx1), (Player::Two, second, rx2)] {
            spawn_peer(tasks, session.clone(), self.sessions.clone(), player, conn, rx);
        }

        info!(
            "Active sessions: {}/{}",
            self.admission.active(),
            self.admission.max_sessions()
        );
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }

    /// Active sessions according to the admission controller.
    pub fn active_sessions(&self) -> usize {
        self.admission.active()
    }

    /// Peers waiting for an opponent.
    pub fn queue_size(&self) -> usize {
        self.queue_len.load(Ordering::Acquire)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
