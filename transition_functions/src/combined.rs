use anyhow::Result;
use balance_cache::BalanceCache;
use types::{config::Config, nonstandard::Phase, preset::Preset, traits::BeaconState};

use crate::{altair, phase0};

pub use crate::unphased::EpochReport;

/// Processes rewards, penalties and score updates for the epoch ending at `state.slot()`.
pub fn process_epoch<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
    balance_cache: &BalanceCache,
) -> Result<()> {
    epoch_report(config, state, balance_cache).map(|_| ())
}

/// Same as [`process_epoch`], but also returns everything computed along the way.
///
/// Fails without touching `state` if `config` does not pass [`Config::validate`].
/// On any later failure `state` may be partially updated and should be discarded.
pub fn epoch_report<P: Preset>(
    config: &Config,
    state: &mut impl BeaconState<P>,
    balance_cache: &BalanceCache,
) -> Result<EpochReport> {
    config.validate()?;

    match state.phase() {
        Phase::Phase0 => phase0::epoch_report(config, state),
        Phase::Altair | Phase::Bellatrix | Phase::Capella | Phase::Alpaca | Phase::Badger => {
            altair::epoch_report(config, state, balance_cache)
        }
    }
}
