use std::time::Duration;

/// Tuning for the sliding-window rate estimate. Shares older than `window`
/// no longer count toward [`pool_coordinator::ShareSubsystem::share_rate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShareLedgerConfig {
    pub window: Duration,
}

impl Default for ShareLedgerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
        }
    }
}
