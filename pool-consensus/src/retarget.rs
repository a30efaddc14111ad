/// Target time between blocks, in milliseconds. A chain-defined constant;
/// `retarget` is a pure function of the two timestamps and the prior
/// difficulty — the exact target interval is a parameter of the chain being
/// mined, not of this crate.
pub const TARGET_BLOCK_TIME_MS: u64 = 15_000;

/// Maximum single-step adjustment factor: difficulty can move at most 4x
/// easier or 4x harder per retarget.
pub const MAX_ADJUSTMENT_FACTOR: u64 = 4;

/// Chain-defined retarget function: a pure function of the two timestamps
/// (milliseconds since epoch) and the prior difficulty. Blocks that arrived
/// faster than `TARGET_BLOCK_TIME_MS` raise the difficulty; slower blocks
/// lower it. The ratio is clamped to `MAX_ADJUSTMENT_FACTOR` in either
/// direction so a single wildly-off sample cannot swing difficulty by more
/// than 4x.
pub fn retarget(now_ms: u64, prev_time_ms: u64, prev_difficulty: u64) -> u64 {
    let expected = TARGET_BLOCK_TIME_MS;
    let elapsed = now_ms.saturating_sub(prev_time_ms).max(1);

    let min_elapsed = expected / MAX_ADJUSTMENT_FACTOR;
    let max_elapsed = expected * MAX_ADJUSTMENT_FACTOR;
    let clamped_elapsed = elapsed.clamp(min_elapsed.max(1), max_elapsed);

    // new_difficulty = prev_difficulty * expected / clamped_elapsed
    let numerator = (prev_difficulty as u128) * (expected as u128);
    let new_difficulty = numerator / (clamped_elapsed as u128);

    new_difficulty.max(1) as u64
}
