//! A concrete [`pool_coordinator::FramedServer`]: a newline-delimited JSON
//! TCP push server for miner clients.
//!
//! `pool-coordinator` never depends on this crate; `pool-node` wires a
//! [`TcpFramedServer`] into a `Coordinator` as a trait object, then calls
//! [`TcpFramedServer::wire`] with the resulting coordinator handle so
//! submissions can be forwarded back in.

pub mod error;
pub mod listener;
pub mod protocol;

pub use error::TcpServerError;
pub use listener::TcpFramedServer;
