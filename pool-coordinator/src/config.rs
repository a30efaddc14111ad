use std::time::Duration;

/// Parameters the coordinator needs at construction time. Everything else
/// (listen addresses, RPC URLs, webhook endpoints) belongs to the concrete
/// collaborators and is configured where they're built, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub pool_name: String,
    pub pool_difficulty: u64,
    pub retry_interval: Duration,
    pub retarget_delay: Duration,
    pub status_interval: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pool_name: "pool".to_string(),
            pool_difficulty: 1,
            retry_interval: Duration::from_secs(5),
            retarget_delay: Duration::from_secs(10),
            status_interval: Some(Duration::from_secs(30)),
        }
    }
}
