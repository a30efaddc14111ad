use thiserror::Error;

/// Errors surfaced by the coordinator itself, as distinct from errors
/// surfaced by its collaborators (`UpstreamError`, `ServerError`, ...),
/// which live in their own crates.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("pool difficulty must be a positive integer: {0}")]
    InvalidDifficulty(#[from] pool_consensus::ConsensusError),
}
