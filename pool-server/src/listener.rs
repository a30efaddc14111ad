use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use pool_coordinator::{ClientContext, ClientId, ClientInfo, Coordinator, FramedServer, ServerError};
use pool_core::BlockTemplate;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TcpServerError;
use crate::protocol::{ClientMessage, ServerMessage};

const TARGET: &str = "pool_server::listener";

struct ClientState {
    outbox: mpsc::UnboundedSender<String>,
    public_address: String,
    graffiti: String,
    subscribed: bool,
}

/// A newline-delimited JSON TCP push server: the miner-facing half of the
/// pool. Accepts connections, tracks per-client subscription state, and
/// relays submissions into a wired [`Coordinator`].
///
/// `pool-coordinator` holds this behind the [`FramedServer`] trait object,
/// so it never names this type; the dependency the other way (this crate
/// on `pool-coordinator`) exists only so a concrete `Coordinator` handle can
/// be wired in after both are constructed, via [`TcpFramedServer::wire`].
pub struct TcpFramedServer {
    listen_addr: SocketAddr,
    clients: RwLock<HashMap<ClientId, ClientState>>,
    next_client_id: AtomicU64,
    ban_count: AtomicU64,
    coordinator: OnceLock<Coordinator>,
    listener_task: AsyncMutex<Option<JoinHandle<()>>>,
    /// Lets the accept loop mint fresh `Arc<Self>` clones for each spawned
    /// per-connection task without `start(&self)` needing to already hold
    /// one — set once via [`Arc::new_cyclic`] at construction.
    self_weak: Weak<Self>,
}

impl TcpFramedServer {
    pub fn new(listen_addr: SocketAddr) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            listen_addr,
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
            ban_count: AtomicU64::new(0),
            coordinator: OnceLock::new(),
            listener_task: AsyncMutex::new(None),
            self_weak: self_weak.clone(),
        })
    }

    /// Wire the coordinator handle submissions are forwarded to. Must be
    /// called before [`FramedServer::start`]; the coordinator itself is
    /// constructed with this server as its `FramedServer`, so the two are
    /// wired together after both exist rather than at construction time.
    pub fn wire(&self, coordinator: Coordinator) {
        let _ = self.coordinator.set(coordinator);
    }

    async fn accept_loop(self_weak: Weak<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let Some(server) = self_weak.upgrade() else {
                        return;
                    };
                    tokio::spawn(async move { server.handle_connection(stream, peer).await });
                }
                Err(err) => {
                    warn!(target: TARGET, error = %err, "accept failed");
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        debug!(target: TARGET, client_id, %peer, "client connected");

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();

        self.clients.write().await.insert(
            client_id,
            ClientState {
                outbox: outbox_tx,
                public_address: String::new(),
                graffiti: String::new(),
                subscribed: false,
            },
        );

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => self.handle_line(client_id, &text).await,
                        Ok(None) => break,
                        Err(err) => {
                            debug!(target: TARGET, client_id, error = %err, "read error");
                            break;
                        }
                    }
                }
                outgoing = outbox_rx.recv() => {
                    match outgoing {
                        Some(mut text) => {
                            text.push('\n');
                            if write_half.write_all(text.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        self.clients.write().await.remove(&client_id);
        debug!(target: TARGET, client_id, "client disconnected");
    }

    async fn handle_line(&self, client_id: ClientId, line: &str) {
        let message: ClientMessage = match serde_json::from_str(line) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(target: TARGET, client_id, error = %err, "malformed client message");
                return;
            }
        };

        match message {
            ClientMessage::Subscribe { public_address, graffiti } => {
                let mut clients = self.clients.write().await;
                if let Some(state) = clients.get_mut(&client_id) {
                    state.public_address = public_address;
                    state.graffiti = graffiti;
                    state.subscribed = true;
                }
            }
            ClientMessage::Submit { mining_request_id, randomness } => {
                self.handle_submit(client_id, mining_request_id, randomness).await;
            }
        }
    }

    async fn handle_submit(&self, client_id: ClientId, mining_request_id: u64, randomness: String) {
        let Some(coordinator) = self.coordinator.get() else {
            warn!(target: TARGET, error = %TcpServerError::CoordinatorNotWired, "dropping submission");
            return;
        };

        let client = {
            let clients = self.clients.read().await;
            let Some(state) = clients.get(&client_id) else {
                return;
            };
            ClientContext {
                id: client_id,
                public_address: state.public_address.clone(),
                graffiti: state.graffiti.clone(),
            }
        };

        let outcome = coordinator
            .submit_work(client, mining_request_id, randomness)
            .await;

        use pool_coordinator::SubmissionOutcome;
        let (accepted, reason) = match outcome {
            SubmissionOutcome::Processed { .. } => (true, None),
            SubmissionOutcome::Dropped(reason) => (false, Some(drop_reason_label(reason))),
        };

        self.send_to(client_id, &ServerMessage::SubmitAck { accepted, reason })
            .await;
    }

    async fn send_to(&self, client_id: ClientId, message: &ServerMessage<'_>) {
        let Ok(text) = serde_json::to_string(message) else {
            return;
        };
        let clients = self.clients.read().await;
        if let Some(state) = clients.get(&client_id) {
            let _ = state.outbox.send(text);
        }
    }
}

fn drop_reason_label(reason: pool_coordinator::DropReason) -> &'static str {
    use pool_coordinator::DropReason;
    match reason {
        DropReason::Stale => "stale",
        DropReason::Unknown => "unknown_epoch",
        DropReason::Duplicate => "duplicate",
        DropReason::Malformed => "malformed",
    }
}

#[async_trait]
impl FramedServer for TcpFramedServer {
    async fn start(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.listen_addr).await.map_err(|err| {
            ServerError::Bind(TcpServerError::Bind {
                addr: self.listen_addr,
                source: err,
            }.to_string())
        })?;
        info!(target: TARGET, addr = %self.listen_addr, "listening for miners");

        let listener_task = tokio::spawn(Self::accept_loop(self.self_weak.clone(), listener));
        *self.listener_task.lock().await = Some(listener_task);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(task) = self.listener_task.lock().await.take() {
            task.abort();
        }
        self.clients.write().await.clear();
    }

    async fn new_work(&self, request_id: u64, template: &BlockTemplate) {
        let message = ServerMessage::Work { request_id, template };
        let Ok(text) = serde_json::to_string(&message) else {
            return;
        };
        let clients = self.clients.read().await;
        for state in clients.values().filter(|c| c.subscribed) {
            let _ = state.outbox.send(text.clone());
        }
    }

    async fn wait_for_work(&self) {
        let Ok(text) = serde_json::to_string(&ServerMessage::Wait) else {
            return;
        };
        let clients = self.clients.read().await;
        for state in clients.values().filter(|c| c.subscribed) {
            let _ = state.outbox.send(text.clone());
        }
    }

    async fn subscribed_clients(&self) -> Vec<ClientInfo> {
        self.clients
            .read()
            .await
            .iter()
            .filter(|(_, state)| state.subscribed)
            .map(|(id, state)| ClientInfo {
                id: *id,
                public_address: state.public_address.clone(),
            })
            .collect()
    }

    async fn punish(&self, client_id: ClientId, reason: &str) {
        self.ban_count.fetch_add(1, Ordering::SeqCst);
        self.send_to(
            client_id,
            &ServerMessage::Punished { reason: reason.to_string() },
        )
        .await;
        self.clients.write().await.remove(&client_id);
        warn!(target: TARGET, client_id, reason, "punished client");
    }

    async fn ban_count(&self) -> u64 {
        self.ban_count.load(Ordering::SeqCst)
    }
}
