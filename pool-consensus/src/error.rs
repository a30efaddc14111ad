use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("difficulty must be a positive integer, got 0")]
    ZeroDifficulty,

    #[error("target must be non-zero")]
    ZeroTarget,
}
