use anyhow::Result;
use arithmetic::U64Ext as _;
use typenum::Unsigned as _;
use types::{
    config::Config,
    phase0::{
        consts::FAR_FUTURE_EPOCH,
        primitives::{Epoch, Slot},
    },
    preset::Preset,
};

use crate::error::Error;

#[must_use]
pub fn compute_epoch_at_slot<P: Preset>(slot: Slot) -> Epoch {
    slot.div_typenum::<P::SlotsPerEpoch>()
}

#[must_use]
pub const fn compute_start_slot_at_epoch<P: Preset>(epoch: Epoch) -> Slot {
    epoch.saturating_mul(P::SlotsPerEpoch::U64)
}

/// Epoch at which a validator exiting at `exit_epoch` becomes withdrawable.
///
/// Slashed validators wait out the slashings vector instead of the regular delay.
#[must_use]
pub fn compute_withdrawable_epoch<P: Preset>(
    config: &Config,
    exit_epoch: Epoch,
    slashed: bool,
) -> Epoch {
    if exit_epoch == FAR_FUTURE_EPOCH {
        return FAR_FUTURE_EPOCH;
    }

    let delay = if slashed {
        P::EpochsPerSlashingsVector::U64
    } else {
        config.min_validator_withdrawability_delay
    };

    exit_epoch.saturating_add(delay)
}

#[must_use]
pub fn compute_year_at_epoch(config: &Config, epoch: Epoch) -> u64 {
    epoch / config.epochs_per_year
}

/// Looks up the entry for the year containing `epoch`.
///
/// Schedules hold one entry per year. Years past the end use the last entry.
pub fn schedule_entry_at_epoch(
    config: &Config,
    name: &'static str,
    schedule: &[u64],
    epoch: Epoch,
) -> Result<u64> {
    let year = compute_year_at_epoch(config, epoch);

    usize::try_from(year)
        .ok()
        .and_then(|year| schedule.get(year))
        .or_else(|| schedule.last())
        .copied()
        .ok_or_else(|| Error::ScheduleEmpty { name }.into())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::preset::Minimal;

    use super::*;

    #[test_case(FAR_FUTURE_EPOCH, false => FAR_FUTURE_EPOCH)]
    #[test_case(FAR_FUTURE_EPOCH, true => FAR_FUTURE_EPOCH)]
    #[test_case(10, false => 266)]
    #[test_case(10, true => 74)]
    #[test_case(FAR_FUTURE_EPOCH - 1, false => FAR_FUTURE_EPOCH)]
    fn withdrawable_epoch(exit_epoch: Epoch, slashed: bool) -> Epoch {
        compute_withdrawable_epoch::<Minimal>(&Config::minimal(), exit_epoch, slashed)
    }

    #[test]
    fn epoch_and_slot_conversions_use_preset() {
        assert_eq!(compute_epoch_at_slot::<Minimal>(15), 1);
        assert_eq!(compute_epoch_at_slot::<Minimal>(16), 2);
        assert_eq!(compute_start_slot_at_epoch::<Minimal>(2), 16);
        assert_eq!(compute_start_slot_at_epoch::<Minimal>(FAR_FUTURE_EPOCH), Slot::MAX);
    }

    #[test]
    fn schedule_entries_are_clamped_to_last_year() -> Result<()> {
        let config = Config::minimal();
        let per_year = config.epochs_per_year.get();
        let schedule = [30, 20, 10];

        assert_eq!(schedule_entry_at_epoch(&config, "test", &schedule, 0)?, 30);
        assert_eq!(schedule_entry_at_epoch(&config, "test", &schedule, per_year - 1)?, 30);
        assert_eq!(schedule_entry_at_epoch(&config, "test", &schedule, per_year)?, 20);
        assert_eq!(schedule_entry_at_epoch(&config, "test", &schedule, per_year * 9)?, 10);
        assert_eq!(
            schedule_entry_at_epoch(&config, "test", &schedule, FAR_FUTURE_EPOCH)?,
            10,
        );

        let error = schedule_entry_at_epoch(&config, "test", &[], 0)
            .expect_err("an empty schedule has no entries");

        assert_eq!(
            error.downcast_ref(),
            Some(&Error::ScheduleEmpty { name: "test" }),
        );

        Ok(())
    }
}
