use anyhow::Result;
use types::{config::Config, preset::Preset, traits::BeaconState};

use super::epoch_intermediates;
use crate::unphased::{self, EpochDeltas, EpochIntermediates, EpochReport};

pub fn epoch_report<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
) -> Result<EpochReport> {
    let mut intermediates = epoch_intermediates::precompute(state)?;

    epoch_intermediates::process_attestations(state, &mut intermediates)?;

    // Rewards and penalties are not applied in the genesis epoch.
    // Reporting zero deltas for it avoids misleading reports.
    let epoch_deltas = if unphased::should_process_rewards_and_penalties(state) {
        epoch_intermediates::epoch_deltas(config, state, &intermediates)?
    } else {
        vec![EpochDeltas::default(); state.validator_count()]
    };

    let EpochIntermediates {
        statistics,
        mut summaries,
    } = intermediates;

    let pre_balances = state.balances().to_vec();
    let reserve_usage =
        unphased::process_rewards_and_penalties(state, &mut summaries, &epoch_deltas)?;
    let post_balances = state.balances().to_vec();

    Ok(EpochReport {
        phase: state.phase(),
        statistics,
        summaries,
        epoch_deltas,
        reserve_usage,
        pre_balances,
        post_balances,
        bail_out_candidates: vec![],
    })
}
