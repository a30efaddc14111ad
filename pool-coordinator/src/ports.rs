//! The four traits the coordinator is built against. `pool-coordinator`
//! never depends on `pool-upstream`, `pool-server`, `pool-shares`, or any
//! webhook transport — only `pool-node` knows about those crates, and wires
//! concrete implementations in through these trait objects.

use async_trait::async_trait;
use futures::stream::BoxStream;
use pool_core::BlockTemplate;
use thiserror::Error;

pub type ClientId = u64;

/// Everything the coordinator needs to know about a miner submitting work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub id: ClientId,
    pub public_address: String,
    pub graffiti: String,
}

/// A connected client as reported by [`FramedServer::subscribed_clients`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub public_address: String,
}

/// A template plus the previous-block metadata the retarget formula needs,
/// as delivered by the upstream's template stream.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamItem {
    pub template: BlockTemplate,
    pub previous_block_info: pool_core::PreviousBlockInfo,
}

/// Result of submitting a candidate block upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitOutcome {
    pub added: bool,
    pub reason: Option<String>,
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream RPC call failed: {0}")]
    Rpc(String),
    #[error("upstream stream ended unexpectedly")]
    StreamEnded,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server failed to bind: {0}")]
    Bind(String),
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("share subsystem error: {0}")]
    Internal(String),
}

/// The pool's connection to the chain node whose blocks it is mining.
#[async_trait]
pub trait UpstreamNode: Send + Sync {
    /// Attempt a single connection. Returns `false` on failure; never
    /// retries internally — the coordinator owns the retry loop.
    async fn try_connect(&self) -> bool;

    /// Tear down the connection. Idempotent.
    async fn close(&self);

    /// Resolves once when the current connection is detected as closed.
    /// Must be re-subscribed after each successful `try_connect`.
    async fn closed(&self);

    /// The stream of block templates for the current connection. Ends
    /// (`None`) when the connection drops.
    fn template_stream(&self) -> BoxStream<'static, Result<UpstreamItem, UpstreamError>>;

    /// Submit a composed, hashed candidate block.
    async fn submit_block(&self, template: &BlockTemplate) -> Result<SubmitOutcome, UpstreamError>;

    /// A short, human-readable description of how this node is reached
    /// (e.g. `"rpc http://127.0.0.1:9988"`), for connection logs.
    fn connection_mode(&self) -> &str;
}

/// The miner-facing push server.
#[async_trait]
pub trait FramedServer: Send + Sync {
    async fn start(&self) -> Result<(), ServerError>;
    async fn stop(&self);

    /// Broadcast a new epoch of work to every subscribed client.
    async fn new_work(&self, request_id: u64, template: &BlockTemplate);

    /// Tell clients there is currently no work (upstream disconnected).
    async fn wait_for_work(&self);

    async fn subscribed_clients(&self) -> Vec<ClientInfo>;

    /// Penalize a client for a malformed or otherwise abusive submission.
    async fn punish(&self, client_id: ClientId, reason: &str);

    async fn ban_count(&self) -> u64;
}

/// Per-address share accounting.
#[async_trait]
pub trait ShareSubsystem: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
    async fn submit_share(&self, address: &str);

    /// Shares per second, pool-wide if `address` is `None`.
    async fn share_rate(&self, address: Option<&str>) -> f64;

    async fn shares_pending_payout(&self, address: Option<&str>) -> u64;
}

/// Outbound event notifications, independent of the miner-facing protocol.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn pool_connected(&self);
    async fn pool_disconnected(&self);
    async fn pool_submitted_block(&self, hash_hex: &str, hash_rate: f64, miner_count: u64);
    async fn pool_status(&self, status: &crate::status::StatusMessage);
}
