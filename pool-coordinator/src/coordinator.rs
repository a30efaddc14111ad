use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pool_core::BlockTemplate;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::deduper::SubmissionDeduper;
use crate::ports::{
    ClientContext, ClientId, FramedServer, ShareSubsystem, UpstreamItem, UpstreamNode,
    WebhookSink,
};
use crate::state::{ConnectionState, CoordinatorState};
use crate::status::StatusMessage;
use crate::work_cache::WorkCache;

const ENGINE_TARGET: &str = "pool_coordinator::engine";

/// What happened to a submitted nonce.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Dropped(DropReason),
    Processed {
        submitted_block: bool,
        credited_share: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `mining_request_id` doesn't name the current epoch.
    Stale,
    /// The epoch existed once but has aged out of the work cache.
    Unknown,
    /// This `(client, nonce)` pair was already submitted this epoch.
    Duplicate,
    /// The composed header failed to encode.
    Malformed,
}

enum ActorMessage {
    Stop,
    ValidateSubmission {
        mining_request_id: u64,
        client_id: ClientId,
        nonce: String,
        respond_to: oneshot::Sender<ValidateOutcome>,
    },
}

enum ValidateOutcome {
    Accepted(BlockTemplate),
    Stale,
    Unknown,
    Duplicate,
}

struct HeadInfo {
    target: [u8; 32],
    timestamp: u64,
}

/// State private to the running actor task: the work cache, the dedup
/// table, the request-id counter and the phase/connection tracking. Behind
/// an async mutex that is held for the whole duration of one `run()` call,
/// so there is never real contention on it — it exists only so the same
/// counters survive a `stop()` followed by a later `start()`.
struct Inner {
    phase: CoordinatorState,
    connection_state: ConnectionState,
    warned_this_outage: bool,
    next_request_id: u64,
    current_head: Option<HeadInfo>,
    cache: WorkCache,
    dedup: SubmissionDeduper,
    commands_rx: mpsc::UnboundedReceiver<ActorMessage>,
}

struct Shared {
    upstream: Arc<dyn UpstreamNode>,
    server: Arc<dyn FramedServer>,
    shares: Arc<dyn ShareSubsystem>,
    webhooks: Arc<dyn WebhookSink>,
    pool_name: String,
    pool_target: [u8; 32],
    pool_difficulty: u64,
    retry_interval: Duration,
    retarget_delay: Duration,
    status_interval: Option<Duration>,
    commands_tx: mpsc::UnboundedSender<ActorMessage>,
    running: AtomicBool,
    stopped_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
}

impl Shared {
    async fn estimate_hash_rate(&self, address: Option<&str>) -> f64 {
        let share_rate = self.shares.share_rate(address).await;
        scale_hash_rate(share_rate, self.pool_difficulty)
    }

    async fn get_status(&self, address: Option<&str>) -> StatusMessage {
        let (hash_rate, pending, clients, ban_count) = tokio::join!(
            self.estimate_hash_rate(None),
            self.shares.shares_pending_payout(None),
            self.server.subscribed_clients(),
            self.server.ban_count(),
        );
        let miners = clients.len() as u64;

        let (address_hash_rate, address_shares_pending_payout, address_miners) =
            if let Some(addr) = address {
                let (hr, pend) = tokio::join!(
                    self.estimate_hash_rate(Some(addr)),
                    self.shares.shares_pending_payout(Some(addr)),
                );
                let count = clients
                    .iter()
                    .filter(|c| c.public_address == addr)
                    .count() as u64;
                (Some(hr), Some(pend), Some(count))
            } else {
                (None, None, None)
            };

        StatusMessage {
            name: self.pool_name.clone(),
            hash_rate,
            miners,
            shares_pending_payout: pending,
            ban_count,
            address_hash_rate,
            address_shares_pending_payout,
            address_miners,
        }
    }
}

/// Scale a floating-point share rate by a fixed precision factor before
/// multiplying by difficulty, so the multiplication happens in integer
/// arithmetic and doesn't lose precision to floating-point rounding on large
/// difficulties.
fn scale_hash_rate(share_rate: f64, difficulty: u64) -> f64 {
    const PRECISION: u64 = 1_000_000;
    if !share_rate.is_finite() || share_rate <= 0.0 {
        return 0.0;
    }
    let scaled_rate = (share_rate * PRECISION as f64).round() as u128;
    let product = scaled_rate * difficulty as u128;
    product as f64 / PRECISION as f64
}

/// Handle onto a running (or not-yet-started) pool coordinator.
///
/// Cheaply [`Clone`]able: internally an `Arc`. All coordinator state lives
/// in the task spawned by [`Coordinator::start`]; callers never touch it
/// directly, they only ever send messages or call the read-only collaborator
/// accessors exposed here.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
    inner: Arc<AsyncMutex<Inner>>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        upstream: Arc<dyn UpstreamNode>,
        server: Arc<dyn FramedServer>,
        shares: Arc<dyn ShareSubsystem>,
        webhooks: Arc<dyn WebhookSink>,
    ) -> Result<Self, crate::error::CoordinatorError> {
        let pool_target = pool_consensus::target_from_difficulty_checked(config.pool_difficulty)?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (stopped_tx, stopped_rx) = watch::channel(true);

        let shared = Arc::new(Shared {
            upstream,
            server,
            shares,
            webhooks,
            pool_name: config.pool_name,
            pool_target,
            pool_difficulty: config.pool_difficulty,
            retry_interval: config.retry_interval,
            retarget_delay: config.retarget_delay,
            status_interval: config.status_interval,
            commands_tx,
            running: AtomicBool::new(false),
            stopped_tx,
            stopped_rx,
        });

        let inner = Arc::new(AsyncMutex::new(Inner {
            phase: CoordinatorState::Stopped,
            connection_state: ConnectionState::NeverConnected,
            warned_this_outage: false,
            next_request_id: 0,
            current_head: None,
            cache: WorkCache::new(12),
            dedup: SubmissionDeduper::new(),
            commands_rx,
        }));

        Ok(Self { shared, inner })
    }

    /// Start the coordinator's run loop. Idempotent: a second call while
    /// already running is a no-op. Preserves `nextRequestId` and the work
    /// cache across a `stop()` followed by a later `start()` on the same
    /// instance, since both live in `inner`, which outlives any single
    /// `run()` call.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shared.stopped_tx.send(false);
        let shared = self.shared.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            shared.shares.start().await;
            if let Err(err) = shared.server.start().await {
                warn!(target: ENGINE_TARGET, error = %err, "framed server failed to start");
            }
            let mut guard = inner.lock().await;
            guard.phase = CoordinatorState::Connecting;
            guard.run(&shared).await;
            shared.running.store(false, Ordering::Release);
            let _ = shared.stopped_tx.send(true);
        });
    }

    /// Request a stop. Idempotent; a no-op if not currently running.
    /// Returns immediately — await [`Coordinator::wait_for_stop`] to block
    /// until shutdown has finished.
    pub fn stop(&self) {
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        let _ = self.shared.commands_tx.send(ActorMessage::Stop);
    }

    pub async fn wait_for_stop(&self) {
        let mut rx = self.shared.stopped_rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub async fn get_status(&self, address: Option<&str>) -> StatusMessage {
        self.shared.get_status(address).await
    }

    pub async fn estimate_hash_rate(&self, address: Option<&str>) -> f64 {
        self.shared.estimate_hash_rate(address).await
    }

    /// Validate and process one submitted nonce end to end. The staleness
    /// check, cache lookup, clone, duplicate check, and dedup record run
    /// atomically inside the actor task via a round-trip message; composing
    /// the header, encoding, hashing, submitting a block, and crediting a
    /// share run here, in the caller's own task, touching only the cloned
    /// template — never shared coordinator state — so many submissions can
    /// be in flight concurrently without any lock.
    pub async fn submit_work(
        &self,
        client: ClientContext,
        mining_request_id: u64,
        randomness: String,
    ) -> SubmissionOutcome {
        if !self.shared.running.load(Ordering::Acquire) {
            return SubmissionOutcome::Dropped(DropReason::Stale);
        }

        let (respond_to, response) = oneshot::channel();
        let sent = self.shared.commands_tx.send(ActorMessage::ValidateSubmission {
            mining_request_id,
            client_id: client.id,
            nonce: randomness.clone(),
            respond_to,
        });
        if sent.is_err() {
            return SubmissionOutcome::Dropped(DropReason::Stale);
        }

        let outcome = match response.await {
            Ok(outcome) => outcome,
            Err(_) => return SubmissionOutcome::Dropped(DropReason::Stale),
        };

        let mut template = match outcome {
            ValidateOutcome::Stale => return SubmissionOutcome::Dropped(DropReason::Stale),
            ValidateOutcome::Unknown => return SubmissionOutcome::Dropped(DropReason::Unknown),
            ValidateOutcome::Duplicate => {
                return SubmissionOutcome::Dropped(DropReason::Duplicate)
            }
            ValidateOutcome::Accepted(template) => template,
        };

        // Step 6: compose this client's randomness and graffiti into the
        // cloned header. The shared cache entry is untouched.
        template.header.randomness = randomness;
        template.header.graffiti = client.graffiti.clone();

        // Step 7: canonical encode.
        let bytes = match pool_core::serialize_mineable_header(&template.header, &template.extra) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(target: ENGINE_TARGET, client_id = client.id, error = %err, "malformed submission");
                self.shared.server.punish(client.id, "malformed header").await;
                return SubmissionOutcome::Dropped(DropReason::Malformed);
            }
        };

        // Step 8: hash.
        let digest = pool_core::hash(&bytes);
        let digest_hex = hex::encode(digest);

        // Step 9: block check, strictly before the share check.
        let mut submitted_block = false;
        if let Ok(header_target) = pool_core::decode_target_hex(&template.header.target) {
            if pool_core::digest_meets_target(&digest, &header_target) {
                match self.shared.upstream.submit_block(&template).await {
                    Ok(outcome) if outcome.added => {
                        submitted_block = true;
                        let (hash_rate, clients) = tokio::join!(
                            self.shared.estimate_hash_rate(None),
                            self.shared.server.subscribed_clients(),
                        );
                        info!(target: ENGINE_TARGET, hash = %digest_hex, "submitted block upstream");
                        self.shared
                            .webhooks
                            .pool_submitted_block(&digest_hex, hash_rate, clients.len() as u64)
                            .await;
                    }
                    Ok(outcome) => {
                        info!(
                            target: ENGINE_TARGET,
                            hash = %digest_hex,
                            reason = outcome.reason.as_deref().unwrap_or("rejected"),
                            "upstream rejected block",
                        );
                    }
                    Err(err) => {
                        warn!(target: ENGINE_TARGET, error = %err, "block submission failed");
                    }
                }
            }
        }

        // Step 10: share check, independent of the block check above.
        let mut credited_share = false;
        if pool_core::digest_meets_target(&digest, &self.shared.pool_target) {
            self.shared.shares.submit_share(&client.public_address).await;
            credited_share = true;
        }

        SubmissionOutcome::Processed {
            submitted_block,
            credited_share,
        }
    }
}

async fn wait_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => futures::future::pending().await,
    }
}

async fn tick_opt(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => futures::future::pending().await,
    }
}

enum ConnectOutcome {
    Connected,
    Stopped,
}

impl Inner {
    async fn run(&mut self, shared: &Shared) {
        let mut status_ticker = shared.status_interval.map(tokio::time::interval);
        loop {
            match self.phase {
                CoordinatorState::Stopped => break,
                CoordinatorState::Connecting => {
                    match self.connect_loop(shared, &mut status_ticker).await {
                        ConnectOutcome::Connected => self.phase = CoordinatorState::Streaming,
                        ConnectOutcome::Stopped => self.phase = CoordinatorState::Stopped,
                    }
                }
                CoordinatorState::Streaming => {
                    self.stream_loop(shared, &mut status_ticker).await;
                }
            }
        }
        self.shutdown(shared).await;
    }

    async fn connect_loop(
        &mut self,
        shared: &Shared,
        status_ticker: &mut Option<tokio::time::Interval>,
    ) -> ConnectOutcome {
        loop {
            tokio::select! {
                biased;
                Some(msg) = self.commands_rx.recv() => {
                    if self.handle_message(msg) {
                        return ConnectOutcome::Stopped;
                    }
                }
                _ = tick_opt(status_ticker) => {
                    self.fire_status(shared).await;
                }
                connected = shared.upstream.try_connect() => {
                    if connected {
                        self.on_connected(shared).await;
                        return ConnectOutcome::Connected;
                    }
                    self.on_connect_failed();
                    tokio::select! {
                        biased;
                        Some(msg) = self.commands_rx.recv() => {
                            if self.handle_message(msg) {
                                return ConnectOutcome::Stopped;
                            }
                        }
                        _ = tick_opt(status_ticker) => {
                            self.fire_status(shared).await;
                        }
                        _ = tokio::time::sleep(shared.retry_interval) => {}
                    }
                }
            }
        }
    }

    async fn stream_loop(
        &mut self,
        shared: &Shared,
        status_ticker: &mut Option<tokio::time::Interval>,
    ) {
        let mut template_stream = shared.upstream.template_stream();
        let mut retarget_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                Some(msg) = self.commands_rx.recv() => {
                    if self.handle_message(msg) {
                        self.phase = CoordinatorState::Stopped;
                        return;
                    }
                }
                _ = shared.upstream.closed() => {
                    self.on_upstream_closed(shared).await;
                    self.phase = CoordinatorState::Connecting;
                    return;
                }
                item = template_stream.next() => {
                    match item {
                        Some(Ok(upstream_item)) => {
                            self.ingest_template(shared, upstream_item, &mut retarget_deadline).await;
                        }
                        Some(Err(err)) => {
                            warn!(target: ENGINE_TARGET, error = %err, "fatal upstream stream error, stopping");
                            self.phase = CoordinatorState::Stopped;
                            return;
                        }
                        None => {
                            self.on_upstream_closed(shared).await;
                            self.phase = CoordinatorState::Connecting;
                            return;
                        }
                    }
                }
                _ = wait_until_opt(retarget_deadline) => {
                    retarget_deadline = None;
                    self.fire_retarget(shared).await;
                }
                _ = tick_opt(status_ticker) => {
                    self.fire_status(shared).await;
                }
            }
        }
    }

    /// Returns `true` if the message requests a stop.
    fn handle_message(&mut self, msg: ActorMessage) -> bool {
        match msg {
            ActorMessage::Stop => true,
            ActorMessage::ValidateSubmission {
                mining_request_id,
                client_id,
                nonce,
                respond_to,
            } => {
                let outcome = self.validate_submission(mining_request_id, &client_id, &nonce);
                let _ = respond_to.send(outcome);
                false
            }
        }
    }

    fn validate_submission(
        &mut self,
        mining_request_id: u64,
        client_id: &ClientId,
        nonce: &str,
    ) -> ValidateOutcome {
        if self.next_request_id == 0 || mining_request_id != self.next_request_id - 1 {
            debug!(
                target: ENGINE_TARGET,
                mining_request_id,
                current = self.next_request_id.saturating_sub(1),
                "dropping stale submission",
            );
            return ValidateOutcome::Stale;
        }

        let Some(template) = self.cache.get(mining_request_id) else {
            warn!(target: ENGINE_TARGET, mining_request_id, "submission for unknown epoch");
            return ValidateOutcome::Unknown;
        };

        if self.dedup.is_duplicate(client_id, nonce) {
            warn!(target: ENGINE_TARGET, client_id, "duplicate submission");
            return ValidateOutcome::Duplicate;
        }

        self.dedup.record(*client_id, nonce.to_string());
        ValidateOutcome::Accepted(template.clone())
    }

    async fn ingest_template(
        &mut self,
        shared: &Shared,
        item: UpstreamItem,
        retarget_deadline: &mut Option<Instant>,
    ) {
        self.current_head = Some(HeadInfo {
            target: pool_core::decode_target_hex(&item.previous_block_info.target)
                .unwrap_or([0xff; 32]),
            timestamp: item.previous_block_info.timestamp,
        });
        *retarget_deadline = Some(Instant::now() + shared.retarget_delay);
        self.publish_epoch(shared, item.template).await;
    }

    async fn publish_epoch(&mut self, shared: &Shared, template: BlockTemplate) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.cache.insert(request_id, template.clone());
        self.dedup.reset();
        shared.server.new_work(request_id, &template).await;
    }

    async fn fire_retarget(&mut self, shared: &Shared) {
        let Some(head) = &self.current_head else {
            return;
        };
        let prev_difficulty = pool_consensus::difficulty_from_target(&head.target);
        let now_ms = now_millis();
        let new_difficulty = pool_consensus::retarget(now_ms, head.timestamp, prev_difficulty);
        let new_target_hex = hex::encode(pool_consensus::target_from_difficulty(new_difficulty));

        // Mutate the cached entry for the current epoch in place; the new
        // epoch published below carries a clone of this same mutated
        // template under a fresh request id, so both the old and new cache
        // keys reflect the retarget.
        let current_id = self.next_request_id.saturating_sub(1);
        let Some(current_template) = self.cache.get_mut(current_id) else {
            return;
        };
        if new_target_hex == current_template.header.target {
            return;
        }
        current_template.header.target = new_target_hex;
        current_template.header.timestamp = now_ms;
        let retargeted = current_template.clone();

        self.publish_epoch(shared, retargeted).await;
    }

    async fn fire_status(&mut self, shared: &Shared) {
        let status = shared.get_status(None).await;
        shared.webhooks.pool_status(&status).await;
    }

    async fn on_connected(&mut self, shared: &Shared) {
        self.connection_state = ConnectionState::Connected;
        self.warned_this_outage = false;
        info!(target: ENGINE_TARGET, mode = shared.upstream.connection_mode(), "connected to upstream");
        shared.webhooks.pool_connected().await;
    }

    fn on_connect_failed(&mut self) {
        if !self.warned_this_outage {
            warn!(target: ENGINE_TARGET, "failed to connect to upstream, retrying");
            self.warned_this_outage = true;
        }
    }

    async fn on_upstream_closed(&mut self, shared: &Shared) {
        shared.server.wait_for_work().await;
        if self.connection_state == ConnectionState::Connected {
            self.connection_state = ConnectionState::Reconnecting;
            self.warned_this_outage = false;
            shared.webhooks.pool_disconnected().await;
        }
    }

    async fn shutdown(&mut self, shared: &Shared) {
        shared.upstream.close().await;
        shared.server.stop().await;
        shared.shares.stop().await;
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
