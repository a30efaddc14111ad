//! The pool coordination engine: owns work epochs, submission dedup, and the
//! connect/stream/retry state machine that ties an upstream chain node to a
//! miner-facing server and a share ledger.
//!
//! This crate knows nothing about JSON-RPC, sockets, or HTTP webhooks — it
//! is built entirely against the trait objects in [`ports`], so swapping any
//! collaborator never touches this crate.

pub mod config;
pub mod coordinator;
pub mod deduper;
pub mod error;
pub mod ports;
pub mod state;
pub mod status;
pub mod work_cache;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, DropReason, SubmissionOutcome};
pub use error::CoordinatorError;
pub use ports::{
    ClientContext, ClientId, ClientInfo, FramedServer, ServerError, ShareError, ShareSubsystem,
    SubmitOutcome, UpstreamError, UpstreamItem, UpstreamNode, WebhookSink,
};
pub use state::{ConnectionState, CoordinatorState};
pub use status::StatusMessage;
