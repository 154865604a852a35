//! Connection Workers
//!
//! Each paired peer gets two tasks: a worker that reads frames and calls into
//! the session, and a writer that drains the peer's outgoing channel onto the
//! stream.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::game::state::Player;
use crate::network::connection::{PeerConnection, PeerReader, PeerWriter};
use crate::network::protocol::{read_frame, write_frame, Message, MessageType};
use crate::network::session::{GameSession, SessionManager};

/// Outgoing frames buffered per peer before new ones are dropped.
pub const OUTGOING_CAPACITY: usize = 64;

/// Read frames from one peer until it goes away or the session closes.
pub async fn run_worker(
    session: Arc<GameSession>,
    sessions: Arc<SessionManager>,
    player: Player,
    mut reader: PeerReader,
) {
    let mut closed = session.subscribe_close();

    loop {
        let frame = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => {
                debug!(sid = %session.id(), "{} worker stopping, session closed", player);
                return;
            }
            frame = read_frame(&mut reader) => frame,
        };

        let message = match frame {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!(sid = %session.id(), "{} closed the connection", player);
                break;
            }
            Err(e) => {
                error!(sid = %session.id(), "Read from {} failed: {}", player, e);
                break;
            }
        };

        dispatch(&session, player, message).await;
    }

    if session.handle_disconnect(player).await {
        sessions.remove_session(session.id()).await;
    }
}

/// Route one frame to the matching session operation.
async fn dispatch(session: &GameSession, player: Player, message: Message) {
    match message.kind {
        MessageType::Move => match message.cell_index() {
            Some(cell) => session.handle_move(player, cell).await,
            None => debug!(
                sid = %session.id(),
                "Ignoring unparsable move {:?} from {}", message.content, player
            ),
        },
        MessageType::ResetRequest => session.handle_reset_request(player).await,
        MessageType::Chat => session.handle_chat(player, message.content.unwrap_or_default()).await,
        other => debug!(sid = %session.id(), "Ignoring {:?} from {}", other, player),
    }
}

/// Write queued frames to one peer. Shuts the stream down once the session
/// drops the sending side.
pub async fn run_writer(
    mut writer: PeerWriter,
    mut outgoing: mpsc::Receiver<Message>,
    sid: String,
    player: Player,
) {
    while let Some(message) = outgoing.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            error!(sid = %sid, "Send of {:?} to {} failed: {}", message.kind, player, e);
        }
    }

    let _ = writer.shutdown().await;
    debug!(sid = %sid, "{} writer finished", player);
}

/// Spawn the worker and writer for one paired peer.
pub fn spawn_peer(
    tasks: &mut JoinSet<()>,
    session: Arc<GameSession>,
    sessions: Arc<SessionManager>,
    player: Player,
    conn: PeerConnection,
    outgoing: mpsc::Receiver<Message>,
) {
    let (reader, writer) = conn.into_parts();
    let sid = session.id().to_string();
    tasks.spawn(run_writer(writer, outgoing, sid, player));
    tasks.spawn(run_worker(session, sessions, player, reader));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::admission::AdmissionController;
    use crate::network::connection::tests::duplex_connection;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use tokio::io::DuplexStream;

    struct Pair {
        clients: [DuplexStream; 2],
        session: Arc<GameSession>,
        sessions: Arc<SessionManager>,
        admission: Arc<AdmissionController>,
        tasks: JoinSet<()>,
    }

    async fn paired(seed: u64) -> Pair {
        let admission = Arc::new(AdmissionController::new(1));
        let sessions = Arc::new(SessionManager::new());
        let (conn1, client1) = duplex_connection(1);
        let (conn2, client2) = duplex_connection(2);
        let (tx1, rx1) = mpsc::channel(OUTGOING_CAPACITY);
        let (tx2, rx2) = mpsc::channel(OUTGOING_CAPACITY);

        let session = Arc::new(GameSession::with_rng(
            "00c0ffee".into(),
            [tx1, tx2],
            admission.admit(),
            StdRng::seed_from_u64(seed),
        ));
        sessions.register(session.clone()).await;
        session.start().await;

        let mut tasks = JoinSet::new();
        for (player, conn, rx) in [(Player::One, conn1, rx1), (Player::Two, conn2, rx2)] {
            spawn_peer(&mut tasks, session.clone(), sessions.clone(), player, conn, rx);
        }

        Pair {
            clients: [client1, client2],
            session,
            sessions,
            admission,
            tasks,
        }
    }

    async fn join_all(tasks: &mut JoinSet<()>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(result) = tasks.join_next().await {
                result.unwrap();
            }
        })
        .await
        .unwrap();
    }

    async fn next(client: &mut DuplexStream) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(2), read_frame(client))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_moves_flow_through_workers() {
        let mut pair = paired(1).await;
        // START + RESET_CONFIRMATION for each.
        for client in pair.clients.iter_mut() {
            assert_eq!(next(client).await.unwrap().kind, MessageType::Start);
            assert_eq!(next(client).await.unwrap().kind, MessageType::ResetConfirmation);
        }

        let mover = pair.session.game_state().await.turn().unwrap();
        let mover_client = &mut pair.clients[mover.index()];
        write_frame(mover_client, &Message::move_request(8)).await.unwrap();

        for client in pair.clients.iter_mut() {
            let update = next(client).await.unwrap();
            assert_eq!(update.kind, MessageType::Move);
            assert_eq!(update.cell_index(), Some(8));
        }
    }

    #[tokio::test]
    async fn test_unknown_kinds_are_ignored() {
        let mut pair = paired(2).await;
        for client in pair.clients.iter_mut() {
            next(client).await;
            next(client).await;
        }

        write_frame(&mut pair.clients[0], &Message::play_again()).await.unwrap();
        write_frame(&mut pair.clients[0], &Message::chat("still here")).await.unwrap();

        let relayed = next(&mut pair.clients[1]).await.unwrap();
        assert_eq!(relayed.kind, MessageType::Chat);
        assert_eq!(relayed.content.as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_once() {
        let Pair {
            clients: [client1, mut client2],
            sessions,
            admission,
            mut tasks,
            ..
        } = paired(3).await;
        drop(client1);

        next(&mut client2).await;
        next(&mut client2).await;
        let notice = next(&mut client2).await.unwrap();
        assert_eq!(notice.kind, MessageType::Notice);
        assert!(next(&mut client2).await.is_none());

        join_all(&mut tasks).await;
        assert_eq!(admission.active(), 0);
        assert_eq!(sessions.session_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_both_peers_leaving_together_tears_down_once() {
        let Pair {
            clients,
            sessions,
            admission,
            mut tasks,
            ..
        } = paired(5).await;
        drop(clients);

        join_all(&mut tasks).await;
        // A second release would wrap the counter instead of leaving it at zero.
        assert_eq!(admission.active(), 0);
        assert_eq!(sessions.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_a_disconnect() {
        let mut pair = paired(4).await;
        pair.clients[0].write_all(&[0, 0, 0, 0]).await.unwrap();

        for _ in 0..2 {
            next(&mut pair.clients[1]).await;
        }
        let notice = next(&mut pair.clients[1]).await.unwrap();
        assert_eq!(notice.kind, MessageType::Notice);

        join_all(&mut pair.tasks).await;
        assert_eq!(pair.admission.active(), 0);
    }
}
