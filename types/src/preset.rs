#![allow(clippy::module_name_repetitions)]

use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use nonzero_ext::nonzero;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display, EnumString};
use typenum::{NonZero, Prod, Unsigned, U256, U32, U64, U8, U8192};

use crate::{config::Config, phase0::primitives::Gwei};

#[cfg(test)]
use ::{enum_iterator::Sequence, strum::VariantNames};

/// Compile-time configuration variables.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    // Phase 0
    type EpochsPerHistoricalRoot: Unsigned + NonZero;
    type EpochsPerSlashingsVector: Unsigned + NonZero;
    type SlotsPerEpoch: Unsigned + NonZero;

    // Derived type-level variables
    type SlotsPerHistoricalRoot: Unsigned + NonZero;

    // Meta
    const NAME: PresetName;

    // Phase 0
    const BASE_REWARD_FACTOR: u64 = 64;
    const EFFECTIVE_BALANCE_INCREMENT: NonZeroU64 = nonzero!(1_000_000_000_u64);
    const INACTIVITY_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(1_u64 << 26);
    const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;
    const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;
    const PROPOSER_REWARD_QUOTIENT: NonZeroU64 = nonzero!(8_u64);

    // Altair
    const INACTIVITY_PENALTY_QUOTIENT_ALTAIR: NonZeroU64 = nonzero!(3_u64 << 24);

    // Bellatrix
    const INACTIVITY_PENALTY_QUOTIENT_BELLATRIX: NonZeroU64 = nonzero!(1_u64 << 24);

    // Alpaca
    const INACTIVITY_PENALTY_QUOTIENT_ALPACA: NonZeroU64 = nonzero!(1_u64 << 25);
    const MIN_ACTIVATION_BALANCE: Gwei = 32_000_000_000;

    /// Returns the default configuration associated with a preset.
    ///
    /// This should only be used in tests and benchmarks.
    #[must_use]
    fn default_config() -> Config {
        Self::NAME.default_config()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    // Phase 0
    type EpochsPerHistoricalRoot = U256;
    type EpochsPerSlashingsVector = U8192;
    type SlotsPerEpoch = U32;

    // Derived type-level variables
    type SlotsPerHistoricalRoot = Prod<Self::EpochsPerHistoricalRoot, Self::SlotsPerEpoch>;

    // Meta
    const NAME: PresetName = PresetName::Mainnet;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    // Phase 0
    type EpochsPerHistoricalRoot = U8;
    type EpochsPerSlashingsVector = U64;
    type SlotsPerEpoch = U8;

    // Derived type-level variables
    type SlotsPerHistoricalRoot = Prod<Self::EpochsPerHistoricalRoot, Self::SlotsPerEpoch>;

    // Meta
    const NAME: PresetName = PresetName::Minimal;

    // Phase 0
    const INACTIVITY_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(1_u64 << 25);
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Display, EnumString, DeserializeFromStr, SerializeDisplay,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(test, derive(Sequence, VariantNames))]
pub enum PresetName {
    #[default]
    Mainnet,
    Minimal,
}

impl PresetName {
    #[must_use]
    pub fn default_config(self) -> Config {
        match self {
            Self::Mainnet => Config::mainnet(),
            Self::Minimal => Config::minimal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr as _;

    use super::*;

    #[test]
    fn preset_names_round_trip_through_strings() {
        for name in enum_iterator::all::<PresetName>() {
            assert_eq!(PresetName::from_str(&name.to_string()).ok(), Some(name));
        }

        assert_eq!(PresetName::VARIANTS, ["mainnet", "minimal"]);
    }

    #[test]
    fn slots_per_historical_root_is_derived_from_epochs() {
        assert_eq!(<Mainnet as Preset>::SlotsPerHistoricalRoot::U64, 8192);
        assert_eq!(<Minimal as Preset>::SlotsPerHistoricalRoot::U64, 64);
    }

    #[test]
    fn default_configs_match_presets() {
        assert_eq!(Mainnet::default_config().preset_base, PresetName::Mainnet);
        assert_eq!(Minimal::default_config().preset_base, PresetName::Minimal);
    }
}
