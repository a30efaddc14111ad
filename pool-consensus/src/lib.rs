//! Target/difficulty arithmetic and the retarget formula.
//!
//! This crate is pure arithmetic with no side effects: the coordinator calls
//! into it as a library, never owning any of this crate's (nonexistent)
//! state.

pub mod error;
pub mod retarget;
pub mod target;

pub use error::ConsensusError;
pub use retarget::{retarget, MAX_ADJUSTMENT_FACTOR, TARGET_BLOCK_TIME_MS};
pub use target::{
    difficulty_from_target, difficulty_from_target_checked, target_from_difficulty,
    target_from_difficulty_checked,
};
