use core::{cmp::Ordering, num::NonZeroU64};
use std::borrow::Cow;

use enum_iterator::Sequence as _;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    nonstandard::Phase,
    phase0::{
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        primitives::{Epoch, Gwei},
    },
    preset::PresetName,
};

const GWEI_IN_TOKEN: Gwei = 1_000_000_000;

/// Configuration variables customizable at runtime.
///
/// Per-year schedules (`issuance_rate`, `max_reward_adjustment_factors`) are indexed by
/// `epoch / epochs_per_year`. Years past the end of a schedule use its last entry.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              The `unsafe` block in `nonzero!` only operates on the literal passed to it."
)]
#[expect(
    clippy::struct_field_names,
    reason = "struct_field_name is allowed to have config_name, as it starts with the same name as struct"
)]
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,
    pub preset_base: PresetName,

    // Forking
    pub altair_fork_epoch: Epoch,
    pub bellatrix_fork_epoch: Epoch,
    pub capella_fork_epoch: Epoch,
    pub alpaca_fork_epoch: Epoch,
    pub badger_fork_epoch: Epoch,

    // Time parameters
    pub min_validator_withdrawability_delay: u64,

    // Validator cycle
    pub churn_limit_quotient: NonZeroU64,
    pub inactivity_score_bias: NonZeroU64,
    pub inactivity_score_recovery_rate: u64,
    pub max_per_epoch_activation_churn_limit: u64,
    pub min_per_epoch_churn_limit: u64,
    pub min_per_epoch_churn_limit_alpaca: Gwei,
    pub min_per_epoch_activation_balance_churn_limit: Gwei,
    pub min_per_epoch_exit_balance_churn_limit: Gwei,

    // Bail-out
    pub bail_out_score_bias: u64,
    pub bail_out_score_threshold: u64,
    pub bail_out_score_recovery_threshold: u64,
    pub bail_out_score_recovery_alpaca: u64,
    pub bail_out_score_recovery_badger: u64,
    pub inactivity_score_bail_out_threshold: u64,
    pub bail_out_penalty_rate: u64,
    pub bail_out_penalty_rate_precision: NonZeroU64,

    // Issuance
    pub max_token_supply: Gwei,
    pub issuance_precision: NonZeroU64,
    pub issuance_rate: Vec<u64>,
    pub epochs_per_year: NonZeroU64,

    // Reward adjustment
    pub reward_adjustment_factor_precision: NonZeroU64,
    pub reward_adjustment_factor_delta: u64,
    pub max_reward_adjustment_factors: Vec<u64>,

    // Target deposit plan
    pub deposit_plan_early_slope: Gwei,
    pub deposit_plan_early_offset: Gwei,
    pub deposit_plan_early_end: u64,
    pub deposit_plan_later_slope: Gwei,
    pub deposit_plan_later_offset: Gwei,
    pub deposit_plan_later_end: u64,
    pub deposit_plan_final: Gwei,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Meta
            //
            // Use `default` as the default `config_name` and override it in `Config::mainnet`.
            config_name: Cow::Borrowed("default"),
            preset_base: PresetName::Mainnet,

            // Forking
            altair_fork_epoch: FAR_FUTURE_EPOCH,
            bellatrix_fork_epoch: FAR_FUTURE_EPOCH,
            capella_fork_epoch: FAR_FUTURE_EPOCH,
            alpaca_fork_epoch: FAR_FUTURE_EPOCH,
            badger_fork_epoch: FAR_FUTURE_EPOCH,

            // Time parameters
            min_validator_withdrawability_delay: 256,

            // Validator cycle
            churn_limit_quotient: nonzero!(1_u64 << 16),
            inactivity_score_bias: nonzero!(4_u64),
            inactivity_score_recovery_rate: 16,
            max_per_epoch_activation_churn_limit: 8,
            min_per_epoch_churn_limit: 4,
            min_per_epoch_churn_limit_alpaca: 128 * GWEI_IN_TOKEN,
            min_per_epoch_activation_balance_churn_limit: 256 * GWEI_IN_TOKEN,
            min_per_epoch_exit_balance_churn_limit: 256 * GWEI_IN_TOKEN,

            // Bail-out
            bail_out_score_bias: 1,
            bail_out_score_threshold: 1024,
            bail_out_score_recovery_threshold: 64,
            bail_out_score_recovery_alpaca: 1,
            bail_out_score_recovery_badger: 32,
            inactivity_score_bail_out_threshold: 4096,
            bail_out_penalty_rate: 5_000,
            bail_out_penalty_rate_precision: nonzero!(10_000_u64),

            // Issuance
            max_token_supply: 1_000_000_000 * GWEI_IN_TOKEN,
            issuance_precision: nonzero!(1_000_000_u64),
            issuance_rate: vec![20_000, 16_000, 12_000, 8_000, 4_000, 0],
            epochs_per_year: nonzero!(82_125_u64),

            // Reward adjustment
            reward_adjustment_factor_precision: nonzero!(100_000_000_u64),
            reward_adjustment_factor_delta: 1_000,
            max_reward_adjustment_factors: vec![10_000, 8_000, 6_000, 4_000, 2_000],

            // Target deposit plan
            deposit_plan_early_slope: 1_000 * GWEI_IN_TOKEN,
            deposit_plan_early_offset: 100_000_000 * GWEI_IN_TOKEN,
            deposit_plan_early_end: 2,
            deposit_plan_later_slope: 250 * GWEI_IN_TOKEN,
            deposit_plan_later_offset: 264_250_000 * GWEI_IN_TOKEN,
            deposit_plan_later_end: 8,
            deposit_plan_final: 387_437_500 * GWEI_IN_TOKEN,
        }
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("mainnet"),

            // Forking
            altair_fork_epoch: 74240,
            bellatrix_fork_epoch: 144_896,
            capella_fork_epoch: 194_048,

            ..Self::default()
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),
            preset_base: PresetName::Minimal,

            // Validator cycle
            churn_limit_quotient: nonzero!(32_u64),
            max_per_epoch_activation_churn_limit: 4,
            min_per_epoch_churn_limit: 2,
            min_per_epoch_churn_limit_alpaca: 64 * GWEI_IN_TOKEN,
            min_per_epoch_activation_balance_churn_limit: 128 * GWEI_IN_TOKEN,
            min_per_epoch_exit_balance_churn_limit: 128 * GWEI_IN_TOKEN,

            // Bail-out
            bail_out_score_threshold: 16,
            bail_out_score_recovery_threshold: 4,
            bail_out_score_recovery_badger: 4,
            inactivity_score_bail_out_threshold: 64,

            // Issuance
            epochs_per_year: nonzero!(1_024_u64),

            // Target deposit plan
            deposit_plan_early_slope: 10_000 * GWEI_IN_TOKEN,
            deposit_plan_early_offset: 1_000_000 * GWEI_IN_TOKEN,
            deposit_plan_later_slope: 1_000 * GWEI_IN_TOKEN,
            deposit_plan_later_offset: 21_480_000 * GWEI_IN_TOKEN,
            deposit_plan_final: 27_624_000 * GWEI_IN_TOKEN,

            ..Self::default()
        }
    }

    #[must_use]
    pub fn start_and_stay_in(mut self, phase: Phase) -> Self {
        self.config_name = Cow::Owned(format!("{phase}-{}", self.config_name));
        self.upgrade_once(phase, GENESIS_EPOCH)
    }

    #[must_use]
    pub fn upgrade_once(mut self, post_phase: Phase, fork_epoch: Epoch) -> Self {
        for (phase, field) in self.fork_epochs_mut() {
            *field = match phase.cmp(&post_phase) {
                Ordering::Less => GENESIS_EPOCH,
                Ordering::Equal => fork_epoch,
                Ordering::Greater => FAR_FUTURE_EPOCH,
            };
        }

        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        if !self.fork_epochs().map(|(_, epoch)| epoch).is_sorted() {
            return Err(Error::ForkEpochsOutOfOrder);
        }

        if self.issuance_rate.is_empty() {
            return Err(Error::IssuanceScheduleEmpty);
        }

        if self.max_reward_adjustment_factors.is_empty() {
            return Err(Error::RewardAdjustmentScheduleEmpty);
        }

        if self.deposit_plan_early_end > self.deposit_plan_later_end {
            return Err(Error::DepositPlanBreakpointsOutOfOrder {
                early_end: self.deposit_plan_early_end,
                later_end: self.deposit_plan_later_end,
            });
        }

        if self.bail_out_score_recovery_threshold > self.bail_out_score_threshold {
            return Err(Error::BailOutRecoveryThresholdAboveThreshold);
        }

        for phase in [Phase::Alpaca, Phase::Badger] {
            if self.bail_out_score_recovery(phase) > self.bail_out_score_recovery_threshold {
                return Err(Error::BailOutRecoveryAboveThreshold { phase });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn genesis_phase(&self) -> Phase {
        self.phase_at_epoch(GENESIS_EPOCH)
    }

    #[inline]
    #[must_use]
    pub const fn fork_epoch(&self, phase: Phase) -> Epoch {
        match phase {
            Phase::Phase0 => GENESIS_EPOCH,
            Phase::Altair => self.altair_fork_epoch,
            Phase::Bellatrix => self.bellatrix_fork_epoch,
            Phase::Capella => self.capella_fork_epoch,
            Phase::Alpaca => self.alpaca_fork_epoch,
            Phase::Badger => self.badger_fork_epoch,
        }
    }

    #[must_use]
    pub fn phase_at_epoch(&self, epoch: Epoch) -> Phase {
        self.fork_epochs()
            .take_while(|(_, fork_epoch)| *fork_epoch <= epoch)
            .map(|(phase, _)| phase)
            .last()
            .unwrap_or(Phase::Phase0)
    }

    /// Amount subtracted from a recovering validator's bail-out score.
    ///
    /// Zero in phases without bail-out scores.
    #[must_use]
    pub const fn bail_out_score_recovery(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Phase0 | Phase::Altair | Phase::Bellatrix | Phase::Capella => 0,
            Phase::Alpaca => self.bail_out_score_recovery_alpaca,
            Phase::Badger => self.bail_out_score_recovery_badger,
        }
    }

    fn fork_epochs(&self) -> impl Iterator<Item = (Phase, Epoch)> {
        // Do not remove the type annotation.
        // It ensures that this method is up to date when new phases are added.
        let fields: [_; Phase::CARDINALITY - 1] = [
            self.altair_fork_epoch,
            self.bellatrix_fork_epoch,
            self.capella_fork_epoch,
            self.alpaca_fork_epoch,
            self.badger_fork_epoch,
        ];

        enum_iterator::all().skip(1).zip(fields)
    }

    fn fork_epochs_mut(&mut self) -> impl Iterator<Item = (Phase, &mut Epoch)> {
        // Do not remove the type annotation.
        // It ensures that this method is up to date when new phases are added.
        let fields: [_; Phase::CARDINALITY - 1] = [
            &mut self.altair_fork_epoch,
            &mut self.bellatrix_fork_epoch,
            &mut self.capella_fork_epoch,
            &mut self.alpaca_fork_epoch,
            &mut self.badger_fork_epoch,
        ];

        enum_iterator::all().skip(1).zip(fields)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error("fork epochs are not in activation order")]
    ForkEpochsOutOfOrder,
    #[error("issuance rate schedule is empty")]
    IssuanceScheduleEmpty,
    #[error("maximum reward adjustment factor schedule is empty")]
    RewardAdjustmentScheduleEmpty,
    #[error(
        "deposit plan early segment ends in year {early_end} \
         after later segment ends in year {later_end}"
    )]
    DepositPlanBreakpointsOutOfOrder { early_end: u64, later_end: u64 },
    #[error("bail-out score recovery threshold is above bail-out score threshold")]
    BailOutRecoveryThresholdAboveThreshold,
    #[error("bail-out score recovery in {phase} is above the recovery threshold")]
    BailOutRecoveryAboveThreshold { phase: Phase },
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Refactoring worsens readability, which is more important in tests."
)]
