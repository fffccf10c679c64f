use anyhow::{ensure, Result};
use arithmetic::SafeArith as _;
use helper_functions::{
    accessors::{
        get_attesting_indices, get_block_root, get_block_root_at_slot, get_current_epoch,
        get_finality_delay, get_previous_epoch,
    },
    error::Error as HelperError,
    fork::RewardParameters,
    predicates::is_in_inactivity_leak,
};
use itertools::{chain, Itertools as _};
use log::debug;
use num_integer::Roots as _;
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        consts::BASE_REWARDS_PER_EPOCH,
        containers::PendingAttestation,
        primitives::{Gwei, ValidatorIndex},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::unphased::{
    ensure_length, ensure_phase, EpochDeltas, EpochIntermediates, Error, Statistics,
    ValidatorSummary,
};

pub fn precompute<P: Preset>(state: &impl BeaconState<P>) -> Result<EpochIntermediates> {
    ensure_phase0(state, "Phase 0 precompute")?;
    ensure_length("balances", state.balances().len(), state.validator_count())?;

    let current_epoch = get_current_epoch(state);
    let previous_epoch = get_previous_epoch(state);

    let summaries = state
        .validators()
        .iter()
        .zip(state.balances())
        .map(|(validator, balance)| {
            ValidatorSummary::new(validator, *balance, current_epoch, previous_epoch)
        })
        .collect_vec();

    let statistics = Statistics::compute::<P>(&summaries)?;

    Ok(EpochIntermediates {
        statistics,
        summaries,
    })
}

/// Marks attesters using the pending attestations recorded in `state`.
///
/// Records whose target epoch does not match the list they are stored in are skipped.
/// Target and head votes are only credited when the corresponding block root is available.
/// It is not during the first slot of an epoch.
pub fn process_attestations<P: Preset>(
    state: &impl BeaconState<P>,
    intermediates: &mut EpochIntermediates,
) -> Result<()> {
    ensure_phase0(state, "attestation processing")?;
    intermediates.ensure_matches(state)?;

    let previous_epoch_attestations = state.previous_epoch_attestations()?;
    let current_epoch_attestations = state.current_epoch_attestations()?;

    for attestation in chain(previous_epoch_attestations, current_epoch_attestations) {
        ensure!(
            attestation.inclusion_delay > 0,
            Error::ZeroInclusionDelay {
                slot: attestation.data.slot,
                index: attestation.data.index,
            },
        );
    }

    let summaries = intermediates.summaries.as_mut_slice();
    let previous_epoch = get_previous_epoch(state);
    let current_epoch = get_current_epoch(state);
    let previous_epoch_target_root = get_block_root(state, AttestationEpoch::Previous).ok();

    for attestation in previous_epoch_attestations
        .iter()
        .filter(|attestation| attestation.data.target.epoch == previous_epoch)
    {
        let PendingAttestation {
            ref aggregation_bits,
            data,
            inclusion_delay,
            proposer_index,
        } = *attestation;

        let matching_target = previous_epoch_target_root == Some(data.target.root);

        let matching_head = matching_target
            && get_block_root_at_slot(state, data.slot)
                .is_ok_and(|root| root == data.beacon_block_root);

        for validator_index in get_attesting_indices(state, data, aggregation_bits)? {
            let summary = summary_mut(summaries, validator_index)?;

            summary.previous_epoch_attester = true;
            summary.previous_epoch_source_attester = true;
            summary.previous_epoch_target_attester |= matching_target;
            summary.previous_epoch_head_attester |= matching_head;

            if inclusion_delay < summary.inclusion_distance {
                summary.inclusion_slot = data.slot.safe_add(inclusion_delay)?;
                summary.inclusion_distance = inclusion_delay;
                summary.proposer_index = proposer_index;
            }
        }
    }

    let current_epoch_target_root = get_block_root(state, AttestationEpoch::Current).ok();

    for attestation in current_epoch_attestations
        .iter()
        .filter(|attestation| attestation.data.target.epoch == current_epoch)
    {
        let data = attestation.data;
        let matching_target = current_epoch_target_root == Some(data.target.root);

        for validator_index in get_attesting_indices(state, data, &attestation.aggregation_bits)? {
            let summary = summary_mut(summaries, validator_index)?;

            summary.current_epoch_attester = true;
            summary.current_epoch_target_attester |= matching_target;
        }
    }

    intermediates.refresh_statistics::<P>()?;

    debug!("Phase 0 attesting balances: {:?}", intermediates.statistics);

    Ok(())
}

pub fn epoch_deltas<P: Preset>(
    config: &Config,
    state: &impl BeaconState<P>,
    intermediates: &EpochIntermediates,
) -> Result<Vec<EpochDeltas>> {
    ensure_phase0(state, "Phase 0 reward calculation")?;
    intermediates.ensure_matches(state)?;

    let EpochIntermediates {
        statistics,
        summaries,
    } = intermediates;

    let inactivity_penalty_quotient =
        RewardParameters::new::<P>(config, state.phase()).inactivity_penalty_quotient;

    let finality_delay = get_finality_delay(state);
    let in_inactivity_leak = is_in_inactivity_leak(state);

    // > Factored out from balance totals to avoid uint64 overflow
    let increment = P::EFFECTIVE_BALANCE_INCREMENT;
    let active_increments = statistics.current_epoch_active_balance / increment;
    let total_active_balance_sqrt = statistics.current_epoch_active_balance.sqrt();

    let mut deltas = vec![EpochDeltas::default(); summaries.len()];

    for (summary, index) in summaries.iter().zip(0..) {
        let ValidatorSummary {
            effective_balance,
            slashed,
            eligible_for_penalties,
            previous_epoch_source_attester,
            previous_epoch_target_attester,
            previous_epoch_head_attester,
            proposer_index,
            inclusion_distance,
            ..
        } = *summary;

        let base_reward = effective_balance
            .safe_mul(P::BASE_REWARD_FACTOR)?
            .safe_div(total_active_balance_sqrt)?
            / BASE_REWARDS_PER_EPOCH;

        let proposer_reward = base_reward / P::PROPOSER_REWARD_QUOTIENT;

        let attestation_component_reward = |attesting_balance: Gwei| -> Result<Gwei> {
            if in_inactivity_leak {
                // > Since full base reward will be canceled out by inactivity penalty deltas,
                // > optimal participation receives full base reward compensation here.
                return Ok(base_reward);
            }

            let reward = base_reward
                .safe_mul(attesting_balance / increment)?
                .safe_div(active_increments)?;

            Ok(reward)
        };

        if eligible_for_penalties {
            let deltas = delta_mut(&mut deltas, index)?;

            if previous_epoch_source_attester && !slashed {
                deltas.source_reward =
                    attestation_component_reward(statistics.previous_epoch_attesting_balance)?;
            } else {
                deltas.source_penalty = base_reward;
            }

            if previous_epoch_target_attester && !slashed {
                deltas.target_reward = attestation_component_reward(
                    statistics.previous_epoch_target_attesting_balance,
                )?;
            } else {
                deltas.target_penalty = base_reward;
            }

            if previous_epoch_head_attester && !slashed {
                deltas.head_reward =
                    attestation_component_reward(statistics.previous_epoch_head_attesting_balance)?;
            } else {
                deltas.head_penalty = base_reward;
            }

            if in_inactivity_leak {
                // > If validator is performing optimally this cancels all rewards for a neutral
                // > balance
                deltas.canceling_penalty = BASE_REWARDS_PER_EPOCH
                    .get()
                    .safe_mul(base_reward)?
                    .safe_sub(proposer_reward)?;

                if !previous_epoch_target_attester || slashed {
                    deltas.inactivity_penalty = effective_balance
                        .safe_mul(finality_delay)?
                        .safe_div(inactivity_penalty_quotient.get())?;
                }
            }
        }

        if summary.included_in_previous_epoch() && !slashed {
            let max_attester_reward = base_reward.safe_sub(proposer_reward)?;

            delta_mut(&mut deltas, proposer_index)?
                .proposer_reward
                .safe_add_assign(proposer_reward)?;

            delta_mut(&mut deltas, index)?.inclusion_delay_reward =
                max_attester_reward.safe_div(inclusion_distance)?;
        }
    }

    Ok(deltas)
}

fn ensure_phase0<P: Preset>(state: &impl BeaconState<P>, stage: &'static str) -> Result<()> {
    let phase = state.phase();
    ensure_phase(stage, phase, !phase.uses_participation_flags())
}

fn summary_mut(
    summaries: &mut [ValidatorSummary],
    validator_index: ValidatorIndex,
) -> Result<&mut ValidatorSummary> {
    usize::try_from(validator_index)
        .ok()
        .and_then(|index| summaries.get_mut(index))
        .ok_or_else(|| HelperError::ValidatorIndexOutOfBounds { validator_index }.into())
}

fn delta_mut(
    deltas: &mut [EpochDeltas],
    validator_index: ValidatorIndex,
) -> Result<&mut EpochDeltas> {
    usize::try_from(validator_index)
        .ok()
        .and_then(|index| deltas.get_mut(index))
        .ok_or_else(|| HelperError::ValidatorIndexOutOfBounds { validator_index }.into())
}
