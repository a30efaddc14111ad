use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use pool_coordinator::{SubmitOutcome, UpstreamError, UpstreamItem, UpstreamNode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::RpcUpstreamError;
use crate::wire::{SubmitBlockParams, SubmitBlockResult, WorkNotification};

const SUBSCRIBE_METHOD: &str = "pool_subscribeWork";
const UNSUBSCRIBE_METHOD: &str = "pool_unsubscribeWork";
const SUBMIT_METHOD: &str = "pool_submitBlock";
const TARGET: &str = "pool_upstream::client";

/// A concrete [`UpstreamNode`] speaking JSON-RPC (with pub/sub over
/// WebSocket) to the upstream full node. One connection is held at a time;
/// [`RpcUpstream::try_connect`] replaces it, [`RpcUpstream::close`] drops it.
pub struct RpcUpstream {
    url: String,
    mode: String,
    current: Mutex<Option<Arc<WsClient>>>,
}

impl RpcUpstream {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        let url = url.into();
        let mode = format!("ws {url}");
        Arc::new(Self {
            url,
            mode,
            current: Mutex::new(None),
        })
    }

    async fn current_client(&self) -> Option<Arc<WsClient>> {
        self.current.lock().await.clone()
    }
}

#[async_trait]
impl UpstreamNode for RpcUpstream {
    async fn try_connect(&self) -> bool {
        match WsClientBuilder::default().build(&self.url).await {
            Ok(client) => {
                *self.current.lock().await = Some(Arc::new(client));
                true
            }
            Err(err) => {
                let err = RpcUpstreamError::Connect {
                    url: self.url.clone(),
                    source: err,
                };
                debug!(target: TARGET, error = %err, "connect attempt failed");
                false
            }
        }
    }

    async fn close(&self) {
        self.current.lock().await.take();
    }

    async fn closed(&self) {
        match self.current_client().await {
            Some(client) => client.on_disconnect().await,
            None => futures::future::pending().await,
        }
    }

    fn template_stream(&self) -> BoxStream<'static, Result<UpstreamItem, UpstreamError>> {
        let current = self.current.try_lock().ok().and_then(|g| g.clone());
        let Some(client) = current else {
            return stream::empty().boxed();
        };

        stream::once(async move {
            let sub: Subscription<WorkNotification> = match client
                .subscribe(SUBSCRIBE_METHOD, jsonrpsee::rpc_params![], UNSUBSCRIBE_METHOD)
                .await
            {
                Ok(sub) => sub,
                Err(err) => {
                    warn!(target: TARGET, error = %err, "failed to subscribe to work notifications");
                    return stream::empty().boxed();
                }
            };

            sub.map(|item| match item {
                Ok(notification) => Ok(UpstreamItem {
                    template: notification.template,
                    previous_block_info: notification.previous_block_info,
                }),
                Err(err) => Err(UpstreamError::Rpc(err.to_string())),
            })
            .boxed()
        })
        .flatten()
        .boxed()
    }

    async fn submit_block(
        &self,
        template: &pool_core::BlockTemplate,
    ) -> Result<SubmitOutcome, UpstreamError> {
        let client = self
            .current_client()
            .await
            .ok_or_else(|| UpstreamError::Rpc("not connected".to_string()))?;

        let params = SubmitBlockParams { template };
        let result: SubmitBlockResult = client
            .request(SUBMIT_METHOD, jsonrpsee::rpc_params![params])
            .await
            .map_err(|err| {
                let err = RpcUpstreamError::Call {
                    method: SUBMIT_METHOD,
                    source: err,
                };
                UpstreamError::Rpc(err.to_string())
            })?;

        Ok(SubmitOutcome {
            added: result.added,
            reason: result.reason,
        })
    }

    fn connection_mode(&self) -> &str {
        &self.mode
    }
}
