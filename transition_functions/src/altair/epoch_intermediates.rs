use anyhow::Result;
use arithmetic::SafeArith as _;
use helper_functions::{
    accessors::{
        compute_base_reward, get_base_reward_per_increment, get_current_epoch, get_previous_epoch,
    },
    alpaca::{get_rewards_per_increment, RewardsPerIncrement},
    fork::RewardParameters,
    predicates::is_in_inactivity_leak,
};
use itertools::izip;
use log::debug;
use types::{
    altair::consts::{
        TIMELY_HEAD_WEIGHT, TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT, WEIGHT_DENOMINATOR,
    },
    config::Config,
    nonstandard::Participation,
    phase0::primitives::Gwei,
    preset::Preset,
    traits::BeaconState,
};

use crate::unphased::{
    ensure_length, ensure_phase, EpochDeltas, EpochIntermediates, Statistics, ValidatorSummary,
};

/// Builds the snapshot for a state that records participation flags.
///
/// Inactivity scores and, starting with Alpaca, bail-out scores must have exactly one entry per
/// validator.
pub fn precompute<P: Preset>(state: &impl BeaconState<P>) -> Result<EpochIntermediates> {
    ensure_flags(state, "participation flag precompute")?;

    let validator_count = state.validator_count();
    let balances = state.balances();
    let inactivity_scores = state.inactivity_scores()?;

    ensure_length("balances", balances.len(), validator_count)?;
    ensure_length("inactivity scores", inactivity_scores.len(), validator_count)?;

    let bail_out_scores = if state.phase().has_tokenomics() {
        let bail_out_scores = state.bail_out_scores()?;
        ensure_length("bail-out scores", bail_out_scores.len(), validator_count)?;
        bail_out_scores
    } else {
        &[]
    };

    let current_epoch = get_current_epoch(state);
    let previous_epoch = get_previous_epoch(state);

    let summaries = izip!(
        state.validators(),
        balances,
        inactivity_scores,
        bail_out_scores.iter().chain(core::iter::repeat(&0)),
    )
    .map(|(validator, balance, inactivity_score, bail_out_score)| ValidatorSummary {
        inactivity_score: *inactivity_score,
        bail_out_score: *bail_out_score,
        ..ValidatorSummary::new(validator, *balance, current_epoch, previous_epoch)
    })
    .collect::<Vec<_>>();

    let statistics = Statistics::compute::<P>(&summaries)?;

    Ok(EpochIntermediates {
        statistics,
        summaries,
    })
}

/// Marks attesters using the participation flags of both epochs and recomputes aggregates.
///
/// Flags of validators that were not active in the corresponding epoch are ignored.
pub fn process_participation<P: Preset>(
    state: &impl BeaconState<P>,
    intermediates: &mut EpochIntermediates,
) -> Result<()> {
    ensure_flags(state, "participation processing")?;
    intermediates.ensure_matches(state)?;

    let validator_count = state.validator_count();
    let previous_epoch_participation = state.previous_epoch_participation()?;
    let current_epoch_participation = state.current_epoch_participation()?;

    ensure_length(
        "previous epoch participation",
        previous_epoch_participation.len(),
        validator_count,
    )?;

    ensure_length(
        "current epoch participation",
        current_epoch_participation.len(),
        validator_count,
    )?;

    for (summary, previous, current) in izip!(
        &mut intermediates.summaries,
        previous_epoch_participation,
        current_epoch_participation,
    ) {
        let participation = Participation {
            previous: *previous,
            current: *current,
        };

        if summary.active_in_current_epoch {
            if participation.current_epoch_matching_source() {
                summary.current_epoch_attester = true;
            }

            if participation.current_epoch_matching_target() {
                summary.current_epoch_target_attester = true;
            }
        }

        if summary.active_in_previous_epoch {
            if participation.previous_epoch_matching_source() {
                summary.previous_epoch_attester = true;
                summary.previous_epoch_source_attester = true;
            }

            if participation.previous_epoch_matching_target() {
                summary.previous_epoch_target_attester = true;
            }

            if participation.previous_epoch_matching_head() {
                summary.previous_epoch_head_attester = true;
            }
        }
    }

    intermediates.refresh_statistics::<P>()?;

    debug!("participating balances: {:?}", intermediates.statistics);

    Ok(())
}

/// Computes rewards and penalties from participation flags and inactivity scores.
///
/// `total_active_balance` should come from the same validator set as `intermediates`.
/// Starting with Alpaca, rewards are funded by issuance plus a share of the reserves, and the
/// part of each validator's reward drawn from the reserves is stored in
/// [`EpochDeltas::reserve_usage`].
pub fn epoch_deltas<P: Preset>(
    config: &Config,
    state: &impl BeaconState<P>,
    intermediates: &EpochIntermediates,
    total_active_balance: Gwei,
) -> Result<Vec<EpochDeltas>> {
    ensure_flags(state, "participation flag reward calculation")?;
    intermediates.ensure_matches(state)?;

    let EpochIntermediates {
        statistics,
        summaries,
    } = intermediates;

    let increment = P::EFFECTIVE_BALANCE_INCREMENT;
    let active_increments = total_active_balance / increment;

    if active_increments == 0 {
        return Ok(vec![EpochDeltas::default(); summaries.len()]);
    }

    let phase = state.phase();
    let inactivity_penalty_quotient =
        RewardParameters::new::<P>(config, phase).inactivity_penalty_quotient;

    let (base_reward_per_increment, reserve_usage_per_increment) = if phase.has_tokenomics() {
        let RewardsPerIncrement {
            base_reward,
            reserve_usage,
        } = get_rewards_per_increment::<P>(
            config,
            get_current_epoch(state),
            state.reserves()?,
            state.reward_adjustment_factor()?,
            total_active_balance,
        )?;

        (base_reward, reserve_usage)
    } else {
        (get_base_reward_per_increment::<P>(total_active_balance), 0)
    };

    let in_inactivity_leak = is_in_inactivity_leak(state);

    let source_increments = statistics.previous_epoch_attesting_balance / increment;
    let target_increments = statistics.previous_epoch_target_attesting_balance / increment;
    let head_increments = statistics.previous_epoch_head_attesting_balance / increment;

    let reward_denominator = active_increments.safe_mul(WEIGHT_DENOMINATOR.get())?;
    let penalty_denominator = config
        .inactivity_score_bias
        .get()
        .safe_mul(inactivity_penalty_quotient.get())?;

    summaries
        .iter()
        .map(|summary| -> Result<EpochDeltas> {
            let mut deltas = EpochDeltas::default();

            let ValidatorSummary {
                effective_balance,
                slashed,
                eligible_for_penalties,
                previous_epoch_source_attester,
                previous_epoch_target_attester,
                previous_epoch_head_attester,
                inactivity_score,
                ..
            } = *summary;

            if !eligible_for_penalties {
                return Ok(deltas);
            }

            let base_reward =
                compute_base_reward::<P>(effective_balance, base_reward_per_increment)?;

            let participation_component_reward = |weight, participating_increments| {
                base_reward
                    .safe_mul(weight)?
                    .safe_mul(participating_increments)?
                    .safe_div(reward_denominator)
            };

            let participation_component_penalty = |weight| {
                base_reward
                    .safe_mul(weight)
                    .map(|weighted| weighted / WEIGHT_DENOMINATOR)
            };

            if !slashed && previous_epoch_source_attester {
                if !in_inactivity_leak {
                    deltas.source_reward =
                        participation_component_reward(TIMELY_SOURCE_WEIGHT, source_increments)?;
                }
            } else {
                deltas.source_penalty = participation_component_penalty(TIMELY_SOURCE_WEIGHT)?;
            }

            if !slashed && previous_epoch_target_attester {
                if !in_inactivity_leak {
                    deltas.target_reward =
                        participation_component_reward(TIMELY_TARGET_WEIGHT, target_increments)?;
                }
            } else {
                deltas.target_penalty = participation_component_penalty(TIMELY_TARGET_WEIGHT)?;

                deltas.inactivity_penalty = effective_balance
                    .safe_mul(inactivity_score)?
                    .safe_div(penalty_denominator)?;
            }

            if !slashed && previous_epoch_head_attester && !in_inactivity_leak {
                deltas.head_reward =
                    participation_component_reward(TIMELY_HEAD_WEIGHT, head_increments)?;
            }

            if base_reward_per_increment > 0 {
                deltas.reserve_usage = deltas
                    .attestation_reward()?
                    .safe_mul(reserve_usage_per_increment)?
                    .safe_div(base_reward_per_increment)?;
            }

            Ok(deltas)
        })
        .collect()
}

fn ensure_flags<P: Preset>(state: &impl BeaconState<P>, stage: &'static str) -> Result<()> {
    let phase = state.phase();
    ensure_phase(stage, phase, phase.uses_participation_flags())
}
