use anyhow::Result;
use arithmetic::safe_sum;
use helper_functions::{
    accessors::get_current_epoch,
    mutators::{decrease_balance, increase_balance},
};
use itertools::izip;
use log::debug;
use serde::Serialize;
use types::{
    nonstandard::Phase,
    phase0::{
        consts::GENESIS_EPOCH,
        primitives::{Gwei, ValidatorIndex},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::unphased::{ensure_length, EpochDeltas, Statistics, ValidatorSummary};

/// Everything computed while processing rewards and penalties for one epoch.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct EpochReport {
    pub phase: Phase,
    pub statistics: Statistics,
    pub summaries: Vec<ValidatorSummary>,
    pub epoch_deltas: Vec<EpochDeltas>,
    pub reserve_usage: Gwei,
    pub pre_balances: Vec<Gwei>,
    pub post_balances: Vec<Gwei>,
    pub bail_out_candidates: Vec<ValidatorIndex>,
}

/// Applies `deltas` to balances and draws the reserve usage they carry from the reserves.
///
/// Nothing is written to `state` unless every balance can be updated. Rewards are added with
/// overflow checks. Penalties saturate at zero. Returns the amount drawn from the reserves.
pub fn process_rewards_and_penalties<P: Preset>(
    state: &mut impl BeaconState<P>,
    summaries: &mut [ValidatorSummary],
    deltas: &[EpochDeltas],
) -> Result<Gwei> {
    if !should_process_rewards_and_penalties(state) {
        return Ok(0);
    }

    let validator_count = state.validator_count();

    ensure_length("snapshot", summaries.len(), validator_count)?;
    ensure_length("deltas", deltas.len(), validator_count)?;
    ensure_length("balances", state.balances().len(), validator_count)?;

    let mut balances = state.balances().to_vec();

    for (balance, summary, deltas) in izip!(&mut balances, summaries.iter_mut(), deltas) {
        summary.balance_before = *balance;

        increase_balance(balance, deltas.combined_reward()?)?;
        decrease_balance(balance, deltas.combined_penalty()?);

        summary.balance_after = *balance;
    }

    let reserve_usage = safe_sum(deltas.iter().map(|deltas| deltas.reserve_usage))?;

    if state.phase().has_tokenomics() {
        let mut reserves = state.reserves()?;
        decrease_balance(&mut reserves, reserve_usage);
        state.set_reserves(reserves)?;

        debug!("reserves decreased by {reserve_usage} to {reserves}");
    }

    state.set_balances(balances)?;

    Ok(reserve_usage)
}

pub fn should_process_rewards_and_penalties<P: Preset>(state: &impl BeaconState<P>) -> bool {
    // > No rewards are applied at the end of `GENESIS_EPOCH` because rewards are for work done
    // > in the previous epoch
    get_current_epoch(state) != GENESIS_EPOCH
}
