use anyhow::Result;
use balance_cache::BalanceCache;
use helper_functions::{
    accessors::{get_current_epoch, get_next_epoch},
    alpaca::compute_reward_adjustment_factor,
    predicates::{is_eligible_for_bail_out, is_in_inactivity_leak},
};
use itertools::izip;
use log::debug;
use types::{
    config::Config, phase0::primitives::ValidatorIndex, preset::Preset, traits::BeaconState,
};

use crate::unphased::{ensure_length, ensure_phase, ValidatorSummary};

/// Moves the reward adjustment factor one step toward the target deposit plan.
pub fn process_reward_adjustment_factor_update<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
    balance_cache: &BalanceCache,
) -> Result<()> {
    let phase = state.phase();

    ensure_phase(
        "reward adjustment factor update",
        phase,
        phase.has_tokenomics(),
    )?;

    let total_balance_with_queue = balance_cache.total_balance_with_queue(state)?;
    let old_factor = state.reward_adjustment_factor()?;

    let new_factor = compute_reward_adjustment_factor(
        config,
        old_factor,
        total_balance_with_queue,
        get_next_epoch(state),
    )?;

    if new_factor != old_factor {
        debug!(
            "reward adjustment factor changed from {old_factor} to {new_factor} \
             (total balance with queue: {total_balance_with_queue})",
        );
    }

    state.set_reward_adjustment_factor(new_factor)
}

/// Collects indices of validators that qualify for a bail-out after rewards have been applied.
///
/// Uses the post-transition balances and inactivity scores recorded in `summaries`.
pub fn bail_out_candidates<P: Preset>(
    config: &Config,
    state: &impl BeaconState<P>,
    summaries: &[ValidatorSummary],
) -> Result<Vec<ValidatorIndex>> {
    let phase = state.phase();

    ensure_phase("bail-out selection", phase, phase.has_tokenomics())?;
    ensure_length("snapshot", summaries.len(), state.validator_count())?;

    let current_epoch = get_current_epoch(state);
    let in_inactivity_leak = is_in_inactivity_leak(state);
    let mut candidates = vec![];

    for (validator_index, validator, summary) in izip!(0.., state.validators(), summaries) {
        if is_eligible_for_bail_out(
            config,
            validator,
            summary.balance_after,
            summary.inactivity_score,
            current_epoch,
            in_inactivity_leak,
        )? {
            candidates.push(validator_index);
        }
    }

    Ok(candidates)
}
