use async_trait::async_trait;
use pool_coordinator::{StatusMessage, WebhookSink};
use serde::Serialize;
use tracing::{debug, warn};

const TARGET: &str = "pool_node::webhook";

/// Posts pool lifecycle events to a configured HTTP endpoint as JSON. When
/// no endpoint is configured (or webhooks are disabled), every notification
/// is a no-op — `pool-node` always wires a `ReqwestWebhookSink`, the sink
/// itself decides whether there's anywhere to send to.
pub struct ReqwestWebhookSink {
    client: reqwest::Client,
    url: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum WebhookEvent<'a> {
    PoolConnected,
    PoolDisconnected,
    PoolSubmittedBlock {
        hash: &'a str,
        hash_rate: f64,
        miner_count: u64,
    },
    PoolStatus {
        status: &'a StatusMessage,
    },
}

impl ReqwestWebhookSink {
    pub fn new(url: Option<String>, enabled: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: if enabled { url } else { None },
        }
    }

    async fn post(&self, event: WebhookEvent<'_>) {
        let Some(url) = &self.url else {
            return;
        };
        match self.client.post(url).json(&event).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(target: TARGET, status = %response.status(), "webhook endpoint rejected notification");
            }
            Ok(_) => debug!(target: TARGET, "webhook delivered"),
            Err(err) => warn!(target: TARGET, error = %err, "webhook delivery failed"),
        }
    }
}

#[async_trait]
impl WebhookSink for ReqwestWebhookSink {
    async fn pool_connected(&self) {
        self.post(WebhookEvent::PoolConnected).await;
    }

    async fn pool_disconnected(&self) {
        self.post(WebhookEvent::PoolDisconnected).await;
    }

    async fn pool_submitted_block(&self, hash_hex: &str, hash_rate: f64, miner_count: u64) {
        self.post(WebhookEvent::PoolSubmittedBlock {
            hash: hash_hex,
            hash_rate,
            miner_count,
        })
        .await;
    }

    async fn pool_status(&self, status: &StatusMessage) {
        self.post(WebhookEvent::PoolStatus { status }).await;
    }
}
