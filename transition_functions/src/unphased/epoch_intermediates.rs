use anyhow::{ensure, Result};
use arithmetic::{safe_sum, ArithmeticError, SafeArith as _};
use helper_functions::{
    mutators::clamp_balance,
    predicates::{
        is_active_validator, is_eligible_for_penalties, is_waiting_for_exit,
        is_withdrawable_validator,
    },
};
use serde::Serialize;
use static_assertions::assert_eq_size;
use types::{
    nonstandard::Phase,
    phase0::{
        consts::FAR_FUTURE_SLOT,
        containers::Validator,
        primitives::{Epoch, Gwei, Slot, ValidatorIndex},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::unphased::Error;

/// Everything derived about one validator during an epoch transition.
///
/// Built by `precompute`, annotated by attestation or participation processing and then by
/// score updates. Never outlives the transition that created it.
#[expect(clippy::struct_excessive_bools)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ValidatorSummary {
    pub active_in_current_epoch: bool,
    pub active_in_previous_epoch: bool,
    pub slashed: bool,
    pub withdrawable_in_current_epoch: bool,
    pub waiting_for_exit: bool,
    pub eligible_for_penalties: bool,
    pub current_epoch_attester: bool,
    pub current_epoch_target_attester: bool,
    pub previous_epoch_attester: bool,
    pub previous_epoch_source_attester: bool,
    pub previous_epoch_target_attester: bool,
    pub previous_epoch_head_attester: bool,
    pub effective_balance: Gwei,
    pub inactivity_score: u64,
    pub bail_out_score: u64,
    pub balance_before: Gwei,
    pub balance_after: Gwei,
    // Phase 0 only. `inclusion_slot` and `inclusion_distance` stay at `FAR_FUTURE_SLOT` for
    // validators without an included previous epoch attestation.
    pub proposer_index: ValidatorIndex,
    pub inclusion_slot: Slot,
    pub inclusion_distance: u64,
}

impl Default for ValidatorSummary {
    fn default() -> Self {
        Self {
            active_in_current_epoch: false,
            active_in_previous_epoch: false,
            slashed: false,
            withdrawable_in_current_epoch: false,
            waiting_for_exit: false,
            eligible_for_penalties: false,
            current_epoch_attester: false,
            current_epoch_target_attester: false,
            previous_epoch_attester: false,
            previous_epoch_source_attester: false,
            previous_epoch_target_attester: false,
            previous_epoch_head_attester: false,
            effective_balance: 0,
            inactivity_score: 0,
            bail_out_score: 0,
            balance_before: 0,
            balance_after: 0,
            proposer_index: 0,
            inclusion_slot: FAR_FUTURE_SLOT,
            inclusion_distance: FAR_FUTURE_SLOT,
        }
    }
}

impl ValidatorSummary {
    /// Derives the fields shared by all phases. Attestation flags and scores start out empty.
    #[must_use]
    pub fn new(
        validator: &Validator,
        balance: Gwei,
        current_epoch: Epoch,
        previous_epoch: Epoch,
    ) -> Self {
        Self {
            active_in_current_epoch: is_active_validator(validator, current_epoch),
            active_in_previous_epoch: is_active_validator(validator, previous_epoch),
            slashed: validator.slashed,
            withdrawable_in_current_epoch: is_withdrawable_validator(validator, current_epoch),
            waiting_for_exit: is_waiting_for_exit(validator),
            eligible_for_penalties: is_eligible_for_penalties(validator, previous_epoch),
            effective_balance: validator.effective_balance,
            balance_before: balance,
            balance_after: balance,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn included_in_previous_epoch(&self) -> bool {
        self.inclusion_distance != FAR_FUTURE_SLOT
    }
}

/// Aggregate effective balances of unslashed validators in each category.
///
/// Every total is clamped to at least `EFFECTIVE_BALANCE_INCREMENT`.
#[expect(clippy::struct_field_names)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize)]
pub struct Statistics {
    pub current_epoch_active_balance: Gwei,
    pub previous_epoch_active_balance: Gwei,
    pub current_epoch_attesting_balance: Gwei,
    pub current_epoch_target_attesting_balance: Gwei,
    pub previous_epoch_attesting_balance: Gwei,
    pub previous_epoch_target_attesting_balance: Gwei,
    pub previous_epoch_head_attesting_balance: Gwei,
}

impl Statistics {
    /// Sums effective balances over `summaries` in a single pass.
    ///
    /// Active balances include slashed validators. Attesting balances do not.
    pub fn compute<P: Preset>(summaries: &[ValidatorSummary]) -> Result<Self, ArithmeticError> {
        let mut statistics = Self::default();

        for summary in summaries {
            let effective_balance = summary.effective_balance;

            if summary.active_in_current_epoch {
                statistics
                    .current_epoch_active_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.active_in_previous_epoch {
                statistics
                    .previous_epoch_active_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.slashed {
                continue;
            }

            if summary.current_epoch_attester {
                statistics
                    .current_epoch_attesting_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.current_epoch_target_attester {
                statistics
                    .current_epoch_target_attesting_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.previous_epoch_attester {
                statistics
                    .previous_epoch_attesting_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.previous_epoch_target_attester {
                statistics
                    .previous_epoch_target_attesting_balance
                    .safe_add_assign(effective_balance)?;
            }

            if summary.previous_epoch_head_attester {
                statistics
                    .previous_epoch_head_attesting_balance
                    .safe_add_assign(effective_balance)?;
            }
        }

        statistics.clamp_balances::<P>();

        Ok(statistics)
    }

    fn clamp_balances<P: Preset>(&mut self) {
        clamp_balance::<P>(&mut self.current_epoch_active_balance);
        clamp_balance::<P>(&mut self.previous_epoch_active_balance);
        clamp_balance::<P>(&mut self.current_epoch_attesting_balance);
        clamp_balance::<P>(&mut self.current_epoch_target_attesting_balance);
        clamp_balance::<P>(&mut self.previous_epoch_attesting_balance);
        clamp_balance::<P>(&mut self.previous_epoch_target_attesting_balance);
        clamp_balance::<P>(&mut self.previous_epoch_head_attesting_balance);
    }
}

/// Snapshot and aggregates shared by all stages of one epoch transition.
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct EpochIntermediates {
    pub statistics: Statistics,
    pub summaries: Vec<ValidatorSummary>,
}

impl EpochIntermediates {
    pub fn ensure_matches<P: Preset>(&self, state: &impl BeaconState<P>) -> Result<()> {
        ensure_length("snapshot", self.summaries.len(), state.validator_count())
    }

    pub(crate) fn refresh_statistics<P: Preset>(&mut self) -> Result<()> {
        self.statistics = Statistics::compute::<P>(&self.summaries)?;
        Ok(())
    }
}

/// Rewards and penalties for one validator, broken down by component.
///
/// Components that do not exist in a phase stay at zero. `reserve_usage` is not part of the
/// reward. It is the share of the reward that is paid out of the reserve.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize)]
pub struct EpochDeltas {
    pub source_reward: Gwei,
    pub source_penalty: Gwei,
    pub target_reward: Gwei,
    pub target_penalty: Gwei,
    pub head_reward: Gwei,
    pub head_penalty: Gwei,
    pub proposer_reward: Gwei,
    pub inclusion_delay_reward: Gwei,
    pub canceling_penalty: Gwei,
    pub inactivity_penalty: Gwei,
    pub reserve_usage: Gwei,
}

assert_eq_size!(EpochDeltas, [u64; 11]);

impl EpochDeltas {
    pub fn attestation_reward(self) -> Result<Gwei, ArithmeticError> {
        safe_sum([self.source_reward, self.target_reward, self.head_reward])
    }

    pub fn combined_reward(self) -> Result<Gwei, ArithmeticError> {
        safe_sum([
            self.attestation_reward()?,
            self.proposer_reward,
            self.inclusion_delay_reward,
        ])
    }

    pub fn combined_penalty(self) -> Result<Gwei, ArithmeticError> {
        safe_sum([
            self.source_penalty,
            self.target_penalty,
            self.head_penalty,
            self.canceling_penalty,
            self.inactivity_penalty,
        ])
    }
}

pub(crate) fn ensure_phase(stage: &'static str, phase: Phase, supported: bool) -> Result<()> {
    ensure!(supported, Error::UnsupportedPhase { stage, phase });
    Ok(())
}

pub(crate) fn ensure_length(field: &'static str, actual: usize, expected: usize) -> Result<()> {
    ensure!(
        actual == expected,
        Error::SnapshotLengthMismatch {
            field,
            expected,
            actual,
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use types::preset::Minimal;

    use super::*;

    const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

    fn active_summary() -> ValidatorSummary {
        ValidatorSummary {
            active_in_current_epoch: true,
            active_in_previous_epoch: true,
            effective_balance: MAX_EFFECTIVE_BALANCE,
            ..ValidatorSummary::default()
        }
    }

    #[test]
    fn statistics_are_clamped_to_one_increment() -> Result<()> {
        let statistics = Statistics::compute::<Minimal>(&[])?;
        let increment = Minimal::EFFECTIVE_BALANCE_INCREMENT.get();

        assert_eq!(statistics.current_epoch_active_balance, increment);
        assert_eq!(statistics.previous_epoch_head_attesting_balance, increment);

        Ok(())
    }

    #[test]
    fn slashed_validators_count_as_active_but_not_as_attesting() -> Result<()> {
        let attester = ValidatorSummary {
            previous_epoch_attester: true,
            previous_epoch_target_attester: true,
            ..active_summary()
        };

        let slashed_attester = ValidatorSummary {
            slashed: true,
            ..attester
        };

        let statistics = Statistics::compute::<Minimal>(&[attester, slashed_attester])?;

        assert_eq!(statistics.current_epoch_active_balance, 2 * MAX_EFFECTIVE_BALANCE);
        assert_eq!(statistics.previous_epoch_active_balance, 2 * MAX_EFFECTIVE_BALANCE);
        assert_eq!(statistics.previous_epoch_attesting_balance, MAX_EFFECTIVE_BALANCE);
        assert_eq!(statistics.previous_epoch_target_attesting_balance, MAX_EFFECTIVE_BALANCE);

        Ok(())
    }

    #[test]
    fn statistics_fail_on_overflow() {
        let huge = ValidatorSummary {
            effective_balance: u64::MAX / 2 + 1,
            ..active_summary()
        };

        assert_eq!(
            Statistics::compute::<Minimal>(&[huge, huge]),
            Err(ArithmeticError::Overflow),
        );
    }

    #[test]
    fn new_summary_classifies_validator() {
        let validator = Validator {
            effective_balance: MAX_EFFECTIVE_BALANCE,
            slashed: true,
            activation_epoch: 0,
            exit_epoch: 2,
            withdrawable_epoch: 6,
            ..Validator::default()
        };

        let summary = ValidatorSummary::new(&validator, 31_000_000_000, 2, 1);

        assert!(!summary.active_in_current_epoch);
        assert!(summary.active_in_previous_epoch);
        assert!(summary.slashed);
        assert!(!summary.withdrawable_in_current_epoch);
        assert!(summary.waiting_for_exit);
        assert!(summary.eligible_for_penalties);
        assert_eq!(summary.balance_before, 31_000_000_000);
        assert_eq!(summary.balance_after, 31_000_000_000);
        assert!(!summary.included_in_previous_epoch());
    }

    #[test]
    fn default_summary_has_no_inclusion() {
        assert!(!ValidatorSummary::default().included_in_previous_epoch());
    }

    #[test]
    fn combined_deltas_are_checked() {
        let deltas = EpochDeltas {
            source_reward: 1,
            target_reward: 2,
            head_reward: 3,
            proposer_reward: 4,
            inclusion_delay_reward: 5,
            source_penalty: 10,
            inactivity_penalty: 20,
            reserve_usage: 100,
            ..EpochDeltas::default()
        };

        assert_eq!(deltas.attestation_reward(), Ok(6));
        assert_eq!(deltas.combined_reward(), Ok(15));
        assert_eq!(deltas.combined_penalty(), Ok(30));

        let overflowing = EpochDeltas {
            source_reward: u64::MAX,
            head_reward: 1,
            ..EpochDeltas::default()
        };

        assert_eq!(overflowing.combined_reward(), Err(ArithmeticError::Overflow));
    }
}
