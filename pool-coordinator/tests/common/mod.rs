use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use pool_coordinator::{
    ClientInfo, FramedServer, ServerError, ShareError, ShareSubsystem, StatusMessage,
    SubmitOutcome, UpstreamError, UpstreamItem, UpstreamNode, WebhookSink,
};
use pool_core::BlockTemplate;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

/// A fake upstream node whose template stream and close signal are driven
/// entirely by the test via [`FakeUpstream::push_template`] and
/// [`FakeUpstream::trigger_close`].
pub struct FakeUpstream {
    connectable: std::sync::atomic::AtomicBool,
    connect_attempts: AtomicU64,
    template_tx: mpsc::UnboundedSender<Result<UpstreamItem, UpstreamError>>,
    template_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Result<UpstreamItem, UpstreamError>>>>,
    closed_notify: Notify,
    submit_outcomes: AsyncMutex<VecDeque<Result<SubmitOutcome, UpstreamError>>>,
    submitted: AsyncMutex<Vec<BlockTemplate>>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        let (template_tx, template_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            connectable: std::sync::atomic::AtomicBool::new(true),
            connect_attempts: AtomicU64::new(0),
            template_tx,
            template_rx: Arc::new(AsyncMutex::new(template_rx)),
            closed_notify: Notify::new(),
            submit_outcomes: AsyncMutex::new(VecDeque::new()),
            submitted: AsyncMutex::new(Vec::new()),
        })
    }

    pub fn set_connectable(&self, connectable: bool) {
        self.connectable.store(connectable, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn push_template(&self, item: UpstreamItem) {
        let _ = self.template_tx.send(Ok(item));
    }

    pub fn push_stream_error(&self) {
        let _ = self
            .template_tx
            .send(Err(UpstreamError::StreamEnded));
    }

    pub fn trigger_close(&self) {
        self.closed_notify.notify_one();
    }

    pub async fn queue_submit_outcome(&self, outcome: Result<SubmitOutcome, UpstreamError>) {
        self.submit_outcomes.lock().await.push_back(outcome);
    }

    pub async fn submitted_templates(&self) -> Vec<BlockTemplate> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl UpstreamNode for FakeUpstream {
    async fn try_connect(&self) -> bool {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.connectable.load(Ordering::SeqCst)
    }

    async fn close(&self) {}

    async fn closed(&self) {
        self.closed_notify.notified().await;
    }

    fn template_stream(&self) -> BoxStream<'static, Result<UpstreamItem, UpstreamError>> {
        let rx = self.template_rx.clone();
        futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await;
            drop(guard);
            item.map(|item| (item, rx.clone()))
        })
        .boxed()
    }

    async fn submit_block(&self, template: &BlockTemplate) -> Result<SubmitOutcome, UpstreamError> {
        self.submitted.lock().await.push(template.clone());
        let mut outcomes = self.submit_outcomes.lock().await;
        outcomes
            .pop_front()
            .unwrap_or(Ok(SubmitOutcome { added: true, reason: None }))
    }

    fn connection_mode(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakeFramedServer {
    pub new_work_calls: AsyncMutex<Vec<(u64, BlockTemplate)>>,
    pub wait_for_work_calls: AsyncMutex<u64>,
    pub punished: AsyncMutex<Vec<(u64, String)>>,
    pub clients: AsyncMutex<Vec<ClientInfo>>,
    pub ban_count: AtomicU64,
}

impl FakeFramedServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_clients(&self, clients: Vec<ClientInfo>) {
        *self.clients.lock().await = clients;
    }
}

#[async_trait]
impl FramedServer for FakeFramedServer {
    async fn start(&self) -> Result<(), ServerError> {
        Ok(())
    }

    async fn stop(&self) {}

    async fn new_work(&self, request_id: u64, template: &BlockTemplate) {
        self.new_work_calls
            .lock()
            .await
            .push((request_id, template.clone()));
    }

    async fn wait_for_work(&self) {
        *self.wait_for_work_calls.lock().await += 1;
    }

    async fn subscribed_clients(&self) -> Vec<ClientInfo> {
        self.clients.lock().await.clone()
    }

    async fn punish(&self, client_id: u64, reason: &str) {
        self.punished.lock().await.push((client_id, reason.to_string()));
    }

    async fn ban_count(&self) -> u64 {
        self.ban_count.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeShareSubsystem {
    pub submitted_shares: AsyncMutex<Vec<String>>,
    pub rate: StdMutex<f64>,
    pub pending_payout: AtomicU64,
}

impl FakeShareSubsystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ShareSubsystem for FakeShareSubsystem {
    async fn start(&self) {}
    async fn stop(&self) {}

    async fn submit_share(&self, address: &str) {
        self.submitted_shares.lock().await.push(address.to_string());
    }

    async fn share_rate(&self, _address: Option<&str>) -> f64 {
        *self.rate.lock().unwrap()
    }

    async fn shares_pending_payout(&self, _address: Option<&str>) -> u64 {
        self.pending_payout.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeWebhookSink {
    pub connected_calls: AsyncMutex<u64>,
    pub disconnected_calls: AsyncMutex<u64>,
    pub submitted_blocks: AsyncMutex<Vec<(String, f64, u64)>>,
    pub statuses: AsyncMutex<Vec<StatusMessage>>,
}

impl FakeWebhookSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WebhookSink for FakeWebhookSink {
    async fn pool_connected(&self) {
        *self.connected_calls.lock().await += 1;
    }

    async fn pool_disconnected(&self) {
        *self.disconnected_calls.lock().await += 1;
    }

    async fn pool_submitted_block(&self, hash_hex: &str, hash_rate: f64, miner_count: u64) {
        self.submitted_blocks
            .lock()
            .await
            .push((hash_hex.to_string(), hash_rate, miner_count));
    }

    async fn pool_status(&self, status: &StatusMessage) {
        self.statuses.lock().await.push(status.clone());
    }
}

pub fn header(target: &str, timestamp: u64) -> pool_core::BlockHeader {
    pool_core::BlockHeader {
        previous_block_hash: "ab".repeat(32),
        target: target.to_string(),
        timestamp,
        randomness: String::new(),
        graffiti: "00".repeat(32),
    }
}

pub fn template(target: &str, timestamp: u64) -> BlockTemplate {
    BlockTemplate {
        header: header(target, timestamp),
        extra: serde_json::Map::new(),
    }
}

pub fn upstream_item(target: &str, timestamp: u64) -> UpstreamItem {
    UpstreamItem {
        template: template(target, timestamp),
        previous_block_info: pool_core::PreviousBlockInfo {
            target: target.to_string(),
            timestamp,
        },
    }
}
