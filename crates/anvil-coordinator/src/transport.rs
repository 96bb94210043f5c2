//! TCP accept loop for the coordinator/worker wire protocol (§6),
//! generalized from the teacher's Unix-socket hub (`echo-session-service`)
//! to a TCP listener carrying length-prefixed [`WireMessage`] frames.

use crate::coordinator::CoordinatorState;
use crate::message::{MessageBody, WireMessage};
use anvil_types::worker::WorkerId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

const READ_CHUNK: usize = 64 * 1024;
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection outbound channel, keyed by the worker id once
/// registration completes. The coordinator's dispatch paths use this to
/// push `Assign`/`Steal`/`Cancel` messages to a specific worker without
/// holding a lock across the socket write.
pub struct Connections {
    senders: parking_lot::Mutex<std::collections::BTreeMap<WorkerId, mpsc::Sender<Vec<u8>>>>,
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

impl Connections {
    /// No connected workers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            senders: parking_lot::Mutex::new(std::collections::BTreeMap::new()),
        }
    }

    /// Register the outbound channel for a freshly-registered worker.
    pub fn insert(&self, id: WorkerId, sender: mpsc::Sender<Vec<u8>>) {
        self.senders.lock().insert(id, sender);
    }

    /// Drop the outbound channel for a disconnected worker.
    pub fn remove(&self, id: WorkerId) {
        self.senders.lock().remove(&id);
    }

    /// Send a framed message to `id`'s connection, if it is still open.
    pub async fn send_to(&self, id: WorkerId, frame: Vec<u8>) -> bool {
        let sender = self.senders.lock().get(&id).cloned();
        match sender {
            Some(sender) => sender.send(frame).await.is_ok(),
            None => false,
        }
    }
}

/// Run the coordinator's TCP accept loop forever, spawning one task per
/// connection. Cancel by dropping the returned task's handle.
#[instrument(skip(state, connections))]
pub async fn serve(
    listener: TcpListener,
    state: Arc<CoordinatorState>,
    connections: Arc<Connections>,
) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "accepted worker connection");
        let state = Arc::clone(&state);
        let connections = Arc::clone(&connections);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, state, connections).await {
                warn!(%peer, %err, "connection handler exited with an error");
            }
        });
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    state: Arc<CoordinatorState>,
    connections: Arc<Connections>,
) -> std::io::Result<()> {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(64);
    let (mut read_half, mut write_half) = socket.split();

    let writer = async {
        while let Some(frame) = outbound_rx.recv().await {
            write_half.write_all(&frame).await?;
        }
        Ok::<(), std::io::Error>(())
    };

    let reader = async {
        let mut buf = Vec::new();
        let mut chunk = vec![0_u8; READ_CHUNK];
        let mut worker_id: Option<WorkerId> = None;
        let next_seq = AtomicU64::new(0);

        loop {
            let n = read_half.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            loop {
                match WireMessage::from_stream(&buf) {
                    Ok(Some((message, consumed))) => {
                        buf.drain(..consumed);
                        dispatch(
                            message,
                            &state,
                            &outbound_tx,
                            &next_seq,
                            &mut worker_id,
                        )
                        .await;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "dropping connection on protocol error");
                        if let Some(id) = worker_id {
                            connections.remove(id);
                        }
                        return Ok(());
                    }
                }
            }
        }

        if let Some(id) = worker_id {
            connections.remove(id);
            state.mark_worker_failed(id, anvil_types::worker::Capabilities::default());
        }
        Ok(())
    };

    tokio::select! {
        r = reader => r,
        r = writer => r,
    }
}

async fn dispatch(
    message: WireMessage,
    state: &Arc<CoordinatorState>,
    outbound_tx: &mpsc::Sender<Vec<u8>>,
    next_seq: &AtomicU64,
    worker_id: &mut Option<WorkerId>,
) {
    match message.body {
        MessageBody::Register {
            capabilities,
            heartbeat_interval: _,
        } => {
            let id = state.register_worker(capabilities, SystemTime::now());
            *worker_id = Some(id);
            state.drain_pending(id, SystemTime::now());
        }
        MessageBody::Heartbeat { load } => {
            if let Some(id) = *worker_id {
                state.heartbeat(id, load, SystemTime::now());
                state.drain_pending(id, SystemTime::now());
            }
        }
        MessageBody::Result {
            action_id,
            outcome: _,
            outputs: _,
            logs: _,
            duration: _,
        } => {
            if let Some(id) = *worker_id {
                state.complete(action_id, id);
                state.drain_pending(id, SystemTime::now());
            }
        }
        MessageBody::Ack { action_id } => {
            if let Some(id) = *worker_id {
                state.ack_steal(id, action_id);
            }
        }
        MessageBody::Assign { .. } | MessageBody::Steal { .. } | MessageBody::Cancel { .. } => {
            // These flow coordinator -> worker only; a worker sending one
            // is a protocol violation and is ignored rather than torn
            // down, since a malformed single message shouldn't drop an
            // otherwise-healthy connection.
        }
    }

    let seq = next_seq.fetch_add(1, Ordering::Relaxed);
    let _ = seq;
    let _ = outbound_tx;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::worker::Capabilities;

    #[tokio::test]
    async fn connections_send_to_a_registered_worker() {
        let connections = Connections::new();
        let (tx, mut rx) = mpsc::channel(4);
        connections.insert(WorkerId(1), tx);

        assert!(connections.send_to(WorkerId(1), vec![1, 2, 3]).await);
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn send_to_an_unknown_worker_returns_false() {
        let connections = Connections::new();
        assert!(!connections.send_to(WorkerId(99), vec![1]).await);
    }

    #[tokio::test]
    async fn removing_a_connection_stops_delivery() {
        let connections = Connections::new();
        let (tx, _rx) = mpsc::channel(4);
        connections.insert(WorkerId(1), tx);
        connections.remove(WorkerId(1));
        assert!(!connections.send_to(WorkerId(1), vec![1]).await);
    }

    #[tokio::test]
    async fn registering_via_dispatch_drains_a_pending_request() {
        let state = Arc::new(CoordinatorState::new());
        let (tx, _rx) = mpsc::channel(4);
        let next_seq = AtomicU64::new(0);
        let mut worker_id = None;

        dispatch(
            WireMessage {
                seq: 0,
                body: MessageBody::Register {
                    capabilities: Capabilities::default(),
                    heartbeat_interval: Duration::from_secs(5),
                },
            },
            &state,
            &tx,
            &next_seq,
            &mut worker_id,
        )
        .await;

        assert!(worker_id.is_some());
    }
}
