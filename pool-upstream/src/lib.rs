//! A concrete [`pool_coordinator::UpstreamNode`] speaking JSON-RPC (with
//! pub/sub over WebSocket) to the chain node whose blocks this pool mines.
//!
//! `pool-coordinator` never depends on this crate; `pool-node` wires an
//! [`RpcUpstream`] into a `Coordinator` as a trait object.

pub mod client;
pub mod error;
pub mod wire;

pub use client::RpcUpstream;
pub use error::RpcUpstreamError;
