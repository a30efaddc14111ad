use primitive_types::U256;

use crate::error::ConsensusError;

/// Difficulty 1 corresponds to the loosest possible target: the maximum
/// representable 256-bit value. Target and difficulty are reciprocals of
/// this constant, expressed over full 32-byte targets rather than a compact
/// nBits encoding.
fn max_target() -> U256 {
    U256::MAX
}

/// Returns the canonical 32-byte big-endian target for difficulty `d`.
///
/// Out-of-domain inputs (a zero difficulty) are a programmer error on any
/// live chain; callers that can receive untrusted difficulty values should
/// check with [`target_from_difficulty_checked`] instead.
pub fn target_from_difficulty(difficulty: u64) -> [u8; 32] {
    target_from_difficulty_checked(difficulty).expect("difficulty must be positive")
}

/// Checked variant of [`target_from_difficulty`].
pub fn target_from_difficulty_checked(difficulty: u64) -> Result<[u8; 32], ConsensusError> {
    if difficulty == 0 {
        return Err(ConsensusError::ZeroDifficulty);
    }
    let target = max_target() / U256::from(difficulty);
    let mut out = [0u8; 32];
    target.to_big_endian(&mut out);
    Ok(out)
}

/// Inverse of [`target_from_difficulty`]; defined for all non-zero targets.
pub fn difficulty_from_target(target: &[u8; 32]) -> u64 {
    difficulty_from_target_checked(target).expect("target must be non-zero")
}

/// Checked variant of [`difficulty_from_target`].
pub fn difficulty_from_target_checked(target: &[u8; 32]) -> Result<u64, ConsensusError> {
    let target = U256::from_big_endian(target);
    if target.is_zero() {
        return Err(ConsensusError::ZeroTarget);
    }
    let difficulty = max_target() / target;
    Ok(difficulty.low_u64().max(1))
}


trait BigEndianArray {
    fn to_big_endian_array(&self) -> [u8; 32];
}

impl BigEndianArray for U256 {
    fn to_big_endian_array(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.to_big_endian(&mut out);
        out
    }
}
