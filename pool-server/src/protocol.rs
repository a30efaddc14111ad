//! Newline-delimited JSON wire protocol between this server and a connected
//! miner. Each line in either direction is one complete JSON value.

use serde::{Deserialize, Serialize};

/// A line sent by a miner client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce this connection's identity before receiving work.
    Subscribe {
        public_address: String,
        graffiti: String,
    },
    /// Submit a candidate solution for the named epoch.
    Submit {
        mining_request_id: u64,
        randomness: String,
    },
}

/// A line sent by the server to a miner client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// A new work epoch to mine against.
    Work {
        request_id: u64,
        template: &'a pool_core::BlockTemplate,
    },
    /// No work is currently available (upstream disconnected).
    Wait,
    /// Acknowledges a processed submission.
    SubmitAck {
        accepted: bool,
        reason: Option<&'static str>,
    },
    /// The connection is being closed for abusive behavior.
    Punished { reason: String },
}
