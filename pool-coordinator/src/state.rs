/// The coordinator's own run phase. Distinct from [`ConnectionState`], which
/// tracks only what is needed to gate the `poolDisconnected` webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Stopped,
    Connecting,
    Streaming,
}

/// Tracks whether the coordinator has ever held an upstream connection, so
/// `poolDisconnected` fires exactly on the `Connected -> Reconnecting` edge
/// (the upstream's close signal) and never on a bare failed reconnect
/// attempt from a pool that was never connected in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NeverConnected,
    Connected,
    Reconnecting,
}
