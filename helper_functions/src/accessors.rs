use core::ops::{Div as _, Mul as _};

use anyhow::{ensure, Result};
use arithmetic::{ArithmeticError, SafeArith as _, U64Ext as _};
use bitvec::slice::BitSlice;
use num_integer::Roots as _;
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};
use tap::{Pipe as _, TryConv as _};
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        consts::GENESIS_EPOCH,
        containers::AttestationData,
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_previous_epoch<P: Preset>(state: &impl BeaconState<P>) -> Epoch {
    get_current_epoch(state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_current_epoch<P: Preset>(state: &impl BeaconState<P>) -> Epoch {
    misc::compute_epoch_at_slot::<P>(state.slot())
}

#[must_use]
pub fn get_next_epoch<P: Preset>(state: &impl BeaconState<P>) -> Epoch {
    get_current_epoch(state).saturating_add(1)
}

#[must_use]
pub fn get_finality_delay<P: Preset>(state: &impl BeaconState<P>) -> u64 {
    get_previous_epoch(state).saturating_sub(state.finalized_epoch())
}

pub fn get_block_root<P: Preset>(
    state: &impl BeaconState<P>,
    attestation_epoch: AttestationEpoch,
) -> Result<H256> {
    let epoch = match attestation_epoch {
        AttestationEpoch::Previous => get_previous_epoch(state),
        AttestationEpoch::Current => get_current_epoch(state),
    };

    get_block_root_at_slot(state, misc::compute_start_slot_at_epoch::<P>(epoch))
}

#[inline]
pub fn get_block_root_at_slot<P: Preset>(state: &impl BeaconState<P>, slot: Slot) -> Result<H256> {
    state.block_root_at_slot(slot)
}

pub fn get_attesting_indices<'all, P: Preset>(
    state: &'all impl BeaconState<P>,
    attestation_data: AttestationData,
    aggregation_bits: &'all BitSlice<u8>,
) -> Result<impl Iterator<Item = ValidatorIndex> + 'all> {
    let committee = state.beacon_committee(attestation_data.slot, attestation_data.index)?;

    ensure!(
        committee.len() == aggregation_bits.len(),
        Error::CommitteeLengthMismatch {
            aggregation_bitlist_length: aggregation_bits.len(),
            committee_length: committee.len(),
        },
    );

    aggregation_bits
        .iter()
        .by_vals()
        .zip(committee.iter().copied())
        .filter_map(|(present, validator_index)| present.then_some(validator_index))
        .pipe(Ok)
}

/// Sums effective balances of validators active in the current epoch.
///
/// The result is at least `EFFECTIVE_BALANCE_INCREMENT` so it can be used as a divisor.
/// This scans the whole registry. Callers that need the value repeatedly should go through a
/// cache keyed by [`BeaconState::balance_cache_seed`].
pub fn compute_total_active_balance<P: Preset>(state: &impl BeaconState<P>) -> Result<Gwei> {
    let current_epoch = get_current_epoch(state);

    let total = state
        .validators()
        .par_iter()
        .filter(|validator| predicates::is_active_validator(validator, current_epoch))
        .map(|validator| Ok(validator.effective_balance))
        .try_reduce(|| 0, u64::safe_add)?;

    Ok(total.max(P::EFFECTIVE_BALANCE_INCREMENT.get()))
}

/// Sums the effective balance that will be at stake once the activation and exit queues clear.
///
/// Pending validators are added and exiting validators subtracted from the active total.
/// The result is floored at zero and then at `EFFECTIVE_BALANCE_INCREMENT`.
pub fn compute_total_balance_with_queue<P: Preset>(state: &impl BeaconState<P>) -> Result<Gwei> {
    let current_epoch = get_current_epoch(state);

    let (active, pending, exiting) = state
        .validators()
        .par_iter()
        .map(|validator| {
            let effective_balance = validator.effective_balance;

            let active = if predicates::is_active_validator(validator, current_epoch) {
                effective_balance
            } else {
                0
            };

            let pending = if predicates::is_pending_validator(validator, current_epoch) {
                effective_balance
            } else {
                0
            };

            let exiting = if predicates::is_exiting_validator(validator, current_epoch) {
                effective_balance
            } else {
                0
            };

            Ok((active, pending, exiting))
        })
        .try_reduce(
            || (0, 0, 0),
            |(active_1, pending_1, exiting_1), (active_2, pending_2, exiting_2)| {
                Ok::<_, ArithmeticError>((
                    active_1.safe_add(active_2)?,
                    pending_1.safe_add(pending_2)?,
                    exiting_1.safe_add(exiting_2)?,
                ))
            },
        )?;

    Ok(active
        .safe_add(pending)?
        .saturating_sub(exiting)
        .max(P::EFFECTIVE_BALANCE_INCREMENT.get()))
}

fn active_validator_count<P: Preset>(state: &impl BeaconState<P>) -> Result<u64> {
    let current_epoch = get_current_epoch(state);

    state
        .validators()
        .par_iter()
        .filter(|validator| predicates::is_active_validator(validator, current_epoch))
        .count()
        .try_conv::<u64>()
        .map_err(Into::into)
}

pub fn get_validator_churn_limit<P: Preset>(
    config: &Config,
    state: &impl BeaconState<P>,
) -> Result<u64> {
    Ok(active_validator_count(state)?
        .div(config.churn_limit_quotient)
        .max(config.min_per_epoch_churn_limit))
}

pub fn get_validator_activation_churn_limit<P: Preset>(
    config: &Config,
    state: &impl BeaconState<P>,
) -> Result<u64> {
    Ok(get_validator_churn_limit(config, state)?.min(config.max_per_epoch_activation_churn_limit))
}

/// Balance that may enter or leave the active set in one epoch.
///
/// Always a multiple of `EFFECTIVE_BALANCE_INCREMENT`.
#[must_use]
pub fn get_balance_churn_limit<P: Preset>(config: &Config, total_active_balance: Gwei) -> Gwei {
    total_active_balance
        .div(config.churn_limit_quotient)
        .max(config.min_per_epoch_churn_limit_alpaca)
        .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
}

#[must_use]
pub fn get_activation_churn_limit<P: Preset>(config: &Config, total_active_balance: Gwei) -> Gwei {
    get_balance_churn_limit::<P>(config, total_active_balance)
        .max(config.min_per_epoch_activation_balance_churn_limit)
        .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
}

#[must_use]
pub fn get_exit_churn_limit<P: Preset>(config: &Config, total_active_balance: Gwei) -> Gwei {
    get_balance_churn_limit::<P>(config, total_active_balance)
        .max(config.min_per_epoch_exit_balance_churn_limit)
        .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
}

pub fn get_base_reward<P: Preset>(
    state: &impl BeaconState<P>,
    validator_index: ValidatorIndex,
    base_reward_per_increment: Gwei,
) -> Result<Gwei> {
    let effective_balance = validator_index
        .try_conv::<usize>()
        .ok()
        .and_then(|index| state.validators().get(index))
        .ok_or(Error::ValidatorIndexOutOfBounds { validator_index })?
        .effective_balance;

    compute_base_reward::<P>(effective_balance, base_reward_per_increment)
}

pub fn compute_base_reward<P: Preset>(
    effective_balance: Gwei,
    base_reward_per_increment: Gwei,
) -> Result<Gwei> {
    let increments = effective_balance / P::EFFECTIVE_BALANCE_INCREMENT;
    Ok(increments.safe_mul(base_reward_per_increment)?)
}

#[must_use]
pub fn get_base_reward_per_increment<P: Preset>(total_active_balance: Gwei) -> Gwei {
    P::EFFECTIVE_BALANCE_INCREMENT
        .get()
        .mul(P::BASE_REWARD_FACTOR)
        .div(total_active_balance.sqrt().max(1))
}

#[cfg(test)]
mod tests {
    use bitvec::{bitvec, order::Lsb0};
    use itertools::Itertools as _;
    use test_case::test_case;
    use types::{
        combined::BeaconState as CombinedBeaconState,
        nonstandard::Phase,
        phase0::{consts::FAR_FUTURE_EPOCH, containers::Validator},
        preset::{Mainnet, Minimal},
    };

    use super::*;

    const INCREMENT: Gwei = 1_000_000_000;
    const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

    fn active(effective_balance: Gwei) -> Validator {
        Validator {
            effective_balance,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            ..Validator::default()
        }
    }

    fn state(validators: Vec<Validator>) -> CombinedBeaconState<Minimal> {
        let balances = validators.iter().map(|validator| validator.effective_balance).collect();
        CombinedBeaconState::new(Phase::Altair, 16, validators, balances)
    }

    #[test]
    fn epochs_are_derived_from_slot() {
        let state = state(vec![]);

        assert_eq!(get_previous_epoch(&state), 1);
        assert_eq!(get_current_epoch(&state), 2);
        assert_eq!(get_next_epoch(&state), 3);
        assert_eq!(get_finality_delay(&state), 1);
    }

    #[test]
    fn previous_epoch_is_genesis_at_genesis() {
        let state = CombinedBeaconState::<Minimal>::new(Phase::Altair, 0, vec![], vec![]);

        assert_eq!(get_previous_epoch(&state), GENESIS_EPOCH);
        assert_eq!(get_finality_delay(&state), 0);
    }

    #[test]
    fn total_active_balance_is_at_least_one_increment() -> Result<()> {
        assert_eq!(compute_total_active_balance(&state(vec![]))?, INCREMENT);
        assert_eq!(compute_total_active_balance(&state(vec![active(1)]))?, INCREMENT);
        assert_eq!(
            compute_total_active_balance(&state(vec![
                active(MAX_EFFECTIVE_BALANCE),
                active(MAX_EFFECTIVE_BALANCE),
            ]))?,
            2 * MAX_EFFECTIVE_BALANCE,
        );

        Ok(())
    }

    #[test]
    fn total_active_balance_ignores_inactive_validators() -> Result<()> {
        let pending = Validator {
            activation_epoch: 3,
            ..active(MAX_EFFECTIVE_BALANCE)
        };
        let exited = Validator {
            exit_epoch: 2,
            ..active(MAX_EFFECTIVE_BALANCE)
        };

        let state = state(vec![active(MAX_EFFECTIVE_BALANCE), pending, exited]);

        assert_eq!(compute_total_active_balance(&state)?, MAX_EFFECTIVE_BALANCE);

        Ok(())
    }

    #[test]
    fn total_active_balance_overflow_is_an_error() {
        let state = state(vec![active(u64::MAX), active(1)]);

        let error = compute_total_active_balance(&state).expect_err("the sum exceeds u64::MAX");

        assert_eq!(error.downcast_ref(), Some(&ArithmeticError::Overflow));
    }

    #[test]
    fn total_balance_with_queue_counts_pending_and_drops_exiting() -> Result<()> {
        let pending = Validator {
            activation_epoch: FAR_FUTURE_EPOCH,
            ..active(10 * INCREMENT)
        };
        let exiting = Validator {
            exit_epoch: 5,
            ..active(4 * INCREMENT)
        };

        let state = state(vec![active(MAX_EFFECTIVE_BALANCE), pending, exiting]);

        assert_eq!(
            compute_total_balance_with_queue(&state)?,
            MAX_EFFECTIVE_BALANCE + 10 * INCREMENT,
        );

        Ok(())
    }

    #[test]
    fn total_balance_with_queue_is_at_least_one_increment() -> Result<()> {
        assert_eq!(compute_total_balance_with_queue(&state(vec![]))?, INCREMENT);
        Ok(())
    }

    // The minimal configuration has a quotient of 32 and a floor of 64 tokens.
    #[test_case(0)]
    #[test_case(64 * 32 * INCREMENT - 1)]
    #[test_case(64 * 32 * INCREMENT)]
    #[test_case(64 * 32 * INCREMENT + 1)]
    #[test_case(65 * 32 * INCREMENT - 1)]
    #[test_case(65 * 32 * INCREMENT + 31)]
    #[test_case(1_000_000 * INCREMENT + 12_345)]
    #[test_case(u64::MAX)]
    fn balance_churn_limits_are_multiples_of_increment(total_active_balance: Gwei) {
        let config = Config::minimal();

        let limits = [
            get_balance_churn_limit::<Minimal>(&config, total_active_balance),
            get_activation_churn_limit::<Minimal>(&config, total_active_balance),
            get_exit_churn_limit::<Minimal>(&config, total_active_balance),
        ];

        for limit in limits {
            assert_eq!(limit % INCREMENT, 0);
        }

        assert!(limits[0] >= config.min_per_epoch_churn_limit_alpaca);
        assert!(limits[1] >= config.min_per_epoch_activation_balance_churn_limit);
        assert!(limits[2] >= config.min_per_epoch_exit_balance_churn_limit);
    }

    #[test]
    fn balance_churn_limit_rounds_down_above_floor() {
        let config = Config::minimal();

        assert_eq!(
            get_balance_churn_limit::<Minimal>(&config, 64 * 32 * INCREMENT - 1),
            64 * INCREMENT,
        );
        assert_eq!(
            get_balance_churn_limit::<Minimal>(&config, 65 * 32 * INCREMENT - 1),
            64 * INCREMENT,
        );
        assert_eq!(
            get_balance_churn_limit::<Minimal>(&config, 65 * 32 * INCREMENT),
            65 * INCREMENT,
        );
    }

    #[test]
    fn validator_churn_limit_uses_floor_and_cap() -> Result<()> {
        let config = Config::minimal();
        let small = state(vec![active(MAX_EFFECTIVE_BALANCE); 4]);
        let large = state(vec![active(MAX_EFFECTIVE_BALANCE); 320]);

        assert_eq!(get_validator_churn_limit(&config, &small)?, 2);
        assert_eq!(get_validator_churn_limit(&config, &large)?, 10);
        assert_eq!(get_validator_activation_churn_limit(&config, &large)?, 4);

        Ok(())
    }

    #[test]
    fn base_reward_scales_with_increments() -> Result<()> {
        let per_increment = get_base_reward_per_increment::<Mainnet>(4 * MAX_EFFECTIVE_BALANCE);

        assert_eq!(per_increment, 64_000_000_000 / 357_770);
        assert_eq!(
            compute_base_reward::<Mainnet>(MAX_EFFECTIVE_BALANCE + 999, per_increment)?,
            32 * per_increment,
        );
        assert_eq!(compute_base_reward::<Mainnet>(999, per_increment)?, 0);

        let state = state(vec![active(MAX_EFFECTIVE_BALANCE)]);

        assert_eq!(get_base_reward(&state, 0, 7)?, 224);
        assert!(get_base_reward(&state, 1, 7).is_err());

        Ok(())
    }

    #[test]
    fn attesting_indices_follow_committee_order() -> Result<()> {
        let mut state = CombinedBeaconState::<Minimal>::new(Phase::Phase0, 16, vec![], vec![]);
        state.committees.insert((9, 0), vec![4, 7, 1]);

        let data = AttestationData {
            slot: 9,
            index: 0,
            ..AttestationData::default()
        };

        let bits = bitvec![u8, Lsb0; 1, 0, 1];
        let indices = get_attesting_indices(&state, data, &bits)?.collect_vec();

        assert_eq!(indices, [4, 1]);

        let short_bits = bitvec![u8, Lsb0; 1, 0];

        assert!(get_attesting_indices(&state, data, &short_bits).is_err());

        Ok(())
    }
}
