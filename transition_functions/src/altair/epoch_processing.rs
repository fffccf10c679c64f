use anyhow::Result;
use arithmetic::SafeArith as _;
use balance_cache::BalanceCache;
use helper_functions::{
    fork::{BailOutParameters, RewardParameters},
    predicates::is_in_inactivity_leak,
};
use log::debug;
use types::{config::Config, preset::Preset, traits::BeaconState};

use super::epoch_intermediates;
use crate::{
    alpaca,
    unphased::{
        self, ensure_length, ensure_phase, EpochDeltas, EpochIntermediates, EpochReport,
        ValidatorSummary,
    },
};

pub fn epoch_report<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
    balance_cache: &BalanceCache,
) -> Result<EpochReport> {
    let mut intermediates = epoch_intermediates::precompute(state)?;

    epoch_intermediates::process_participation(state, &mut intermediates)?;
    process_inactivity_updates(config, state, &mut intermediates.summaries)?;

    let epoch_deltas = if unphased::should_process_rewards_and_penalties(state) {
        let total_active_balance = balance_cache.total_active_balance(state)?;
        epoch_intermediates::epoch_deltas(config, state, &intermediates, total_active_balance)?
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

    let bail_out_candidates = if state.phase().has_tokenomics() {
        alpaca::process_reward_adjustment_factor_update(config, state, balance_cache)?;
        alpaca::bail_out_candidates(config, state, &summaries)?
    } else {
        vec![]
    };

    process_participation_flag_updates(state)?;

    Ok(EpochReport {
        phase: state.phase(),
        statistics,
        summaries,
        epoch_deltas,
        reserve_usage,
        pre_balances,
        post_balances,
        bail_out_candidates,
    })
}

/// Advances inactivity scores and, starting with Alpaca, bail-out scores.
///
/// Scores in `summaries` are updated in place and then written to `state` in one step.
/// Validators not eligible for penalties keep their scores.
pub fn process_inactivity_updates<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
    summaries: &mut [ValidatorSummary],
) -> Result<()> {
    // > Skip the genesis epoch as score updates are based on the previous epoch participation
    if !unphased::should_process_rewards_and_penalties(state) {
        return Ok(());
    }

    let phase = state.phase();

    ensure_phase(
        "inactivity score update",
        phase,
        phase.uses_participation_flags(),
    )?;

    ensure_length("snapshot", summaries.len(), state.validator_count())?;

    let RewardParameters { bail_out, .. } = RewardParameters::new::<P>(config, phase);
    let in_inactivity_leak = is_in_inactivity_leak(state);

    for summary in summaries.iter_mut().filter(|summary| summary.eligible_for_penalties) {
        update_scores(config, bail_out, in_inactivity_leak, summary)?;
    }

    state.set_inactivity_scores(
        summaries
            .iter()
            .map(|summary| summary.inactivity_score)
            .collect(),
    )?;

    if bail_out.is_some() {
        state.set_bail_out_scores(
            summaries
                .iter()
                .map(|summary| summary.bail_out_score)
                .collect(),
        )?;
    }

    debug!("inactivity scores updated (in inactivity leak: {in_inactivity_leak})");

    Ok(())
}

fn update_scores(
    config: &Config,
    bail_out: Option<BailOutParameters>,
    in_inactivity_leak: bool,
    summary: &mut ValidatorSummary,
) -> Result<()> {
    let mut bail_out_score_updated = false;

    if summary.previous_epoch_target_attester && !summary.slashed {
        summary.inactivity_score = summary.inactivity_score.saturating_sub(1);

        if let Some(parameters) = bail_out {
            let recovering = (parameters.recovery_threshold..parameters.score_threshold)
                .contains(&summary.bail_out_score);

            if recovering && !summary.waiting_for_exit {
                summary.bail_out_score = summary.bail_out_score.safe_sub(parameters.recovery)?;
            }
        }
    } else {
        summary.inactivity_score = summary
            .inactivity_score
            .safe_add(config.inactivity_score_bias.get())?;

        if let Some(parameters) = bail_out {
            if summary.active_in_previous_epoch
                && summary.bail_out_score < parameters.score_threshold
                && !summary.waiting_for_exit
            {
                summary.bail_out_score = summary.bail_out_score.safe_add(parameters.score_bias)?;
                bail_out_score_updated = true;
            }
        }
    }

    // Validators already past the threshold keep accumulating even when they attested.
    if let Some(parameters) = bail_out {
        if !summary.waiting_for_exit
            && !bail_out_score_updated
            && summary.bail_out_score >= parameters.score_threshold
            && summary.bail_out_score < u64::MAX - parameters.score_bias
        {
            summary.bail_out_score = summary.bail_out_score.safe_add(parameters.score_bias)?;
        }
    }

    if !in_inactivity_leak {
        summary.inactivity_score = summary
            .inactivity_score
            .saturating_sub(config.inactivity_score_recovery_rate);
    }

    Ok(())
}

/// Moves current epoch participation into the previous epoch and clears the current epoch.
pub fn process_participation_flag_updates<P: Preset>(
    state: &mut impl BeaconState<P>,
) -> Result<()> {
    let phase = state.phase();

    ensure_phase(
        "participation flag rotation",
        phase,
        phase.uses_participation_flags(),
    )?;

    let current_epoch_participation = state.current_epoch_participation()?.to_vec();

    state.set_previous_epoch_participation(current_epoch_participation)?;
    state.set_current_epoch_participation(vec![0; state.validator_count()])
}
