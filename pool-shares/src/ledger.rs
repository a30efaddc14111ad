use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pool_coordinator::ShareSubsystem;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ShareLedgerConfig;

const TARGET: &str = "pool_shares::ledger";

struct AddressState {
    recent: VecDeque<Instant>,
    pending_payout: u64,
}

impl Default for AddressState {
    fn default() -> Self {
        Self {
            recent: VecDeque::new(),
            pending_payout: 0,
        }
    }
}

/// In-memory share ledger. Every submitted share is recorded both under its
/// address and in a pool-wide window, so `share_rate(None)` doesn't require
/// summing every address's window on each status tick.
pub struct InMemoryShareLedger {
    config: ShareLedgerConfig,
    by_address: RwLock<HashMap<String, AddressState>>,
    pool_wide: RwLock<VecDeque<Instant>>,
}

impl InMemoryShareLedger {
    pub fn new(config: ShareLedgerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            by_address: RwLock::new(HashMap::new()),
            pool_wide: RwLock::new(VecDeque::new()),
        })
    }

    fn prune(deque: &mut VecDeque<Instant>, window: std::time::Duration, now: Instant) {
        while let Some(front) = deque.front() {
            if now.duration_since(*front) > window {
                deque.pop_front();
            } else {
                break;
            }
        }
    }

    fn rate_of(deque: &VecDeque<Instant>, window: std::time::Duration) -> f64 {
        let window_secs = window.as_secs_f64();
        if window_secs <= 0.0 {
            return 0.0;
        }
        deque.len() as f64 / window_secs
    }
}

#[async_trait]
impl ShareSubsystem for InMemoryShareLedger {
    async fn start(&self) {
        info!(target: TARGET, "share ledger started");
    }

    async fn stop(&self) {
        info!(target: TARGET, "share ledger stopped");
    }

    async fn submit_share(&self, address: &str) {
        let now = Instant::now();

        let mut by_address = self.by_address.write().await;
        let state = by_address.entry(address.to_string()).or_default();
        state.recent.push_back(now);
        state.pending_payout += 1;
        Self::prune(&mut state.recent, self.config.window, now);
        drop(by_address);

        let mut pool_wide = self.pool_wide.write().await;
        pool_wide.push_back(now);
        Self::prune(&mut pool_wide, self.config.window, now);
    }

    async fn share_rate(&self, address: Option<&str>) -> f64 {
        let now = Instant::now();
        match address {
            Some(addr) => {
                let mut by_address = self.by_address.write().await;
                let Some(state) = by_address.get_mut(addr) else {
                    return 0.0;
                };
                Self::prune(&mut state.recent, self.config.window, now);
                Self::rate_of(&state.recent, self.config.window)
            }
            None => {
                let mut pool_wide = self.pool_wide.write().await;
                Self::prune(&mut pool_wide, self.config.window, now);
                Self::rate_of(&pool_wide, self.config.window)
            }
        }
    }

    async fn shares_pending_payout(&self, address: Option<&str>) -> u64 {
        let by_address = self.by_address.read().await;
        match address {
            Some(addr) => by_address.get(addr).map(|s| s.pending_payout).unwrap_or(0),
            None => by_address.values().map(|s| s.pending_payout).sum(),
        }
    }
}
