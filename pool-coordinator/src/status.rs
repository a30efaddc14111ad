use serde::Serialize;

/// Snapshot of pool health, broadcast on the status timer and returned
/// directly to a client asking for its own stats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub name: String,
    pub hash_rate: f64,
    pub miners: u64,
    pub shares_pending_payout: u64,
    pub ban_count: u64,
    pub address_hash_rate: Option<f64>,
    pub address_shares_pending_payout: Option<u64>,
    pub address_miners: Option<u64>,
}
