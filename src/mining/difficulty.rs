//! Difficulty retargeting and hash targets
//!
//! All arithmetic is integer: difficulty and the correction factor are
//! thousandths, the target is a 256-bit integer.

use crate::core::{Block, Chain, ChainError, ConsensusParams, Difficulty, MILLI};
use log::info;
use primitive_types::U256;

/// Largest hash a block at `difficulty` may have.
///
/// `initial_target / milli(difficulty) * 1000`, never easier than the
/// initial target.
pub fn hash_target(params: &ConsensusParams, difficulty: Difficulty) -> U256 {
    let initial = params.initial_hash_target;
    if difficulty.milli() == 0 {
        return initial;
    }
    let target = (initial / U256::from(difficulty.milli())).saturating_mul(U256::from(MILLI));
    target.min(initial)
}

/// Retarget correction factor in thousandths for an observed span between
/// retarget points, clamped to the configured bounds. A non-positive span
/// takes the upper bound.
pub fn correction_factor(params: &ConsensusParams, actual_span_ms: i64) -> u64 {
    let (min, max) = (params.min_correction_milli, params.max_correction_milli);
    if actual_span_ms <= 0 {
        return max;
    }

    let expected = u128::from(params.target_recalc_span_ms());
    let factor = expected * u128::from(MILLI) / actual_span_ms as u128;
    u64::try_from(factor).unwrap_or(u64::MAX).clamp(min, max)
}

/// Difficulty a candidate block must carry.
///
/// Genesis uses the initial difficulty. Between retarget heights a block
/// inherits its parent's difficulty; at a retarget height the parent's
/// difficulty is scaled by the correction factor over the last period and
/// floored at the initial difficulty.
pub fn retarget(
    params: &ConsensusParams,
    chain: &Chain,
    candidate: &Block,
) -> Result<Difficulty, ChainError> {
    if candidate.previous_hash().is_none() {
        return Ok(params.initial_difficulty);
    }

    let parent = chain.previous_of(candidate)?;
    let period = params.difficulty_recalc_period.max(1);
    if candidate.height() % period != 0 {
        return Ok(parent.difficulty());
    }

    let anchor = chain.ancestor(candidate, period)?;
    // Overflow only comes from out-of-range timestamps; treat it as no progress
    let actual_span = candidate
        .timestamp()
        .checked_sub(anchor.timestamp())
        .unwrap_or(0);
    let correction = correction_factor(params, actual_span);

    let scaled = u128::from(parent.difficulty().milli()) * u128::from(correction) / u128::from(MILLI);
    let scaled = u64::try_from(scaled).unwrap_or(u64::MAX);
    let next = Difficulty::from_milli(scaled.max(params.initial_difficulty.milli()));

    info!(
        "Difficulty retarget at height {}: {} -> {} (observed {}ms, expected {}ms)",
        candidate.height(),
        parent.difficulty(),
        next,
        actual_span,
        params.target_recalc_span_ms()
    );

    Ok(next)
}
