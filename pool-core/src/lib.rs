//! Data model and canonical encoding for mineable block headers.
//!
//! This crate has no notion of a mining pool: it only knows how to turn a
//! [`BlockHeader`] into the bytes proof-of-work is measured over, and how to
//! compare a BLAKE3 digest against a target.

pub mod error;
pub mod header;

pub use error::HeaderError;
pub use header::{
    decode_target_hex, digest_meets_target, hash, serialize_mineable_header, BlockHeader,
    BlockTemplate,
};

/// `PreviousBlockInfo` delivered alongside each upstream template.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreviousBlockInfo {
    pub target: String,
    pub timestamp: u64,
}
