use anyhow::Result;
use arithmetic::SafeArith as _;
use types::{
    config::Config,
    nonstandard::Phase,
    phase0::{
        consts::FAR_FUTURE_EPOCH,
        containers::Validator,
        primitives::{Epoch, Gwei},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::accessors;

// > Check if ``validator`` is active.
#[inline]
#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

#[inline]
#[must_use]
pub const fn is_pending_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch > epoch
}

#[inline]
#[must_use]
pub const fn is_exiting_validator(validator: &Validator, epoch: Epoch) -> bool {
    is_active_validator(validator, epoch) && validator.exit_epoch != FAR_FUTURE_EPOCH
}

#[inline]
#[must_use]
pub const fn is_waiting_for_exit(validator: &Validator) -> bool {
    validator.exit_epoch != FAR_FUTURE_EPOCH
}

#[inline]
#[must_use]
pub const fn is_withdrawable_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.withdrawable_epoch <= epoch
}

// > Check if ``validator`` is eligible to be placed into the activation queue.
#[must_use]
pub const fn is_eligible_for_activation_queue<P: Preset>(
    validator: &Validator,
    phase: Phase,
) -> bool {
    if validator.activation_eligibility_epoch != FAR_FUTURE_EPOCH {
        return false;
    }

    if phase.has_tokenomics() {
        validator.effective_balance >= P::MIN_ACTIVATION_BALANCE
    } else {
        validator.effective_balance == P::MAX_EFFECTIVE_BALANCE
    }
}

// > Check if ``validator`` is eligible for activation.
#[must_use]
pub fn is_eligible_for_activation<P: Preset>(
    state: &impl BeaconState<P>,
    validator: &Validator,
) -> bool {
    // > Placement in queue is finalized
    validator.activation_eligibility_epoch <= state.finalized_epoch()
        // > Has not yet been activated
        && validator.activation_epoch == FAR_FUTURE_EPOCH
}

#[inline]
#[must_use]
pub const fn is_eligible_for_penalties(validator: &Validator, previous_epoch: Epoch) -> bool {
    is_active_validator(validator, previous_epoch)
        || (validator.slashed && previous_epoch.saturating_add(1) < validator.withdrawable_epoch)
}

// > Check if ``validator`` is slashable.
#[inline]
#[must_use]
pub const fn is_slashable_validator(validator: &Validator, epoch: Epoch) -> bool {
    !validator.slashed
        && epoch < validator.withdrawable_epoch
        && validator.activation_epoch <= epoch
}

/// Checks whether `validator` should be forcibly exited.
///
/// A validator qualifies once its balance falls more than the penalty rate below its principal,
/// or, during an inactivity leak, once its inactivity score passes the leak threshold.
pub fn is_eligible_for_bail_out(
    config: &Config,
    validator: &Validator,
    balance: Gwei,
    inactivity_score: u64,
    epoch: Epoch,
    in_inactivity_leak: bool,
) -> Result<bool> {
    if !is_active_validator(validator, epoch) {
        return Ok(false);
    }

    let bail_out_buffer = validator
        .principal_balance
        .safe_mul(config.bail_out_penalty_rate)?
        / config.bail_out_penalty_rate_precision;

    if balance.safe_add(bail_out_buffer)? < validator.principal_balance {
        return Ok(true);
    }

    Ok(in_inactivity_leak && inactivity_score > config.inactivity_score_bail_out_threshold)
}

#[must_use]
pub fn is_in_inactivity_leak<P: Preset>(state: &impl BeaconState<P>) -> bool {
    accessors::get_finality_delay(state) > P::MIN_EPOCHS_TO_INACTIVITY_PENALTY
}
