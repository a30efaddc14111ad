use serde::{Deserialize, Serialize};

/// Wire shape of one item on the `pool_subscribeWork` subscription: a
/// candidate template plus the previous block's target/timestamp. The
/// previous-block info is required on every notification — the retarget
/// timer has nothing to compute from without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkNotification {
    pub template: pool_core::BlockTemplate,
    pub previous_block_info: pool_core::PreviousBlockInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitBlockParams<'a> {
    pub template: &'a pool_core::BlockTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBlockResult {
    pub added: bool,
    pub reason: Option<String>,
}
