use core::cmp::Ordering;

use anyhow::Result;
use arithmetic::SafeArith as _;
use types::{
    config::Config,
    phase0::primitives::{Epoch, Gwei},
    preset::Preset,
};

use crate::misc;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct RewardWithReserveUsage {
    pub total_reward: Gwei,
    pub reserve_usage: Gwei,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct RewardsPerIncrement {
    pub base_reward: Gwei,
    pub reserve_usage: Gwei,
}

pub fn get_epoch_issuance(config: &Config, epoch: Epoch) -> Result<Gwei> {
    let rate =
        misc::schedule_entry_at_epoch(config, "ISSUANCE_RATE", &config.issuance_rate, epoch)?;

    let issuance = (config.max_token_supply / config.issuance_precision).safe_mul(rate)?;

    Ok(issuance / config.epochs_per_year)
}

pub fn get_max_reward_adjustment_factor(config: &Config, epoch: Epoch) -> Result<u64> {
    misc::schedule_entry_at_epoch(
        config,
        "MAX_REWARD_ADJUSTMENT_FACTORS",
        &config.max_reward_adjustment_factors,
        epoch,
    )
}

/// Total effective balance the protocol aims to have staked at `epoch`.
///
/// Linear in `epoch` within each of the early and later segments, constant afterwards.
/// The later segment is measured from the end of the early one.
pub fn get_target_deposit_plan(config: &Config, epoch: Epoch) -> Result<Gwei> {
    let early_end = config.deposit_plan_early_end.safe_mul(config.epochs_per_year.get())?;
    let later_end = config.deposit_plan_later_end.safe_mul(config.epochs_per_year.get())?;

    if epoch < early_end {
        let growth = config.deposit_plan_early_slope.safe_mul(epoch)?;
        return Ok(config.deposit_plan_early_offset.safe_add(growth)?);
    }

    if epoch < later_end {
        let growth = config
            .deposit_plan_later_slope
            .safe_mul(epoch.safe_sub(early_end)?)?;
        return Ok(config.deposit_plan_later_offset.safe_add(growth)?);
    }

    Ok(config.deposit_plan_final)
}

/// Issuance for `epoch` plus the boost drawn from `reserves`.
///
/// The boost is proportional to `reward_adjustment_factor` and never exceeds `reserves`.
pub fn get_total_reward_with_reserve_usage(
    config: &Config,
    epoch: Epoch,
    reserves: Gwei,
    reward_adjustment_factor: u64,
) -> Result<RewardWithReserveUsage> {
    let issuance = get_epoch_issuance(config, epoch)?;

    let feedback_boost = (config.max_token_supply / config.reward_adjustment_factor_precision)
        .safe_mul(reward_adjustment_factor)?
        / config.epochs_per_year;

    let reserve_usage = feedback_boost.min(reserves);

    Ok(RewardWithReserveUsage {
        total_reward: issuance.safe_add(reserve_usage)?,
        reserve_usage,
    })
}

pub fn get_rewards_per_increment<P: Preset>(
    config: &Config,
    epoch: Epoch,
    reserves: Gwei,
    reward_adjustment_factor: u64,
    total_active_balance: Gwei,
) -> Result<RewardsPerIncrement> {
    let RewardWithReserveUsage {
        total_reward,
        reserve_usage,
    } = get_total_reward_with_reserve_usage(config, epoch, reserves, reward_adjustment_factor)?;

    let active_increments = total_active_balance / P::EFFECTIVE_BALANCE_INCREMENT;

    Ok(RewardsPerIncrement {
        base_reward: total_reward.safe_div(active_increments)?,
        reserve_usage: reserve_usage.safe_div(active_increments)?,
    })
}

/// Moves `reward_adjustment_factor` one step toward the target deposit plan at `next_epoch`.
///
/// The factor falls while more than the target is staked and rises while less is,
/// bounded by zero and the maximum for the year containing `next_epoch`.
pub fn compute_reward_adjustment_factor(
    config: &Config,
    reward_adjustment_factor: u64,
    total_balance_with_queue: Gwei,
    next_epoch: Epoch,
) -> Result<u64> {
    let target = get_target_deposit_plan(config, next_epoch)?;
    let delta = config.reward_adjustment_factor_delta;

    let factor = match total_balance_with_queue.cmp(&target) {
        Ordering::Greater => reward_adjustment_factor.saturating_sub(delta),
        Ordering::Less => reward_adjustment_factor
            .safe_add(delta)?
            .min(get_max_reward_adjustment_factor(config, next_epoch)?),
        Ordering::Equal => reward_adjustment_factor,
    };

    Ok(factor)
}

#[cfg(test)]
mod tests {
    use arithmetic::ArithmeticError;
    use itertools::Itertools as _;
    use types::{phase0::consts::FAR_FUTURE_EPOCH, preset::Minimal};

    use super::*;

    const TOKEN: Gwei = 1_000_000_000;

    #[test]
    fn issuance_follows_yearly_schedule() -> Result<()> {
        let config = Config::mainnet();
        let per_year = config.epochs_per_year.get();

        // 1e9 tokens * 2% / 82125 epochs.
        assert_eq!(get_epoch_issuance(&config, 0)?, 20_000_000 * TOKEN / per_year);
        assert_eq!(get_epoch_issuance(&config, per_year)?, 16_000_000 * TOKEN / per_year);
        assert_eq!(get_epoch_issuance(&config, 5 * per_year)?, 0);
        assert_eq!(get_epoch_issuance(&config, FAR_FUTURE_EPOCH)?, 0);

        Ok(())
    }

    #[test]
    fn issuance_fails_on_empty_schedule() {
        let config = Config {
            issuance_rate: vec![],
            ..Config::minimal()
        };

        assert!(get_epoch_issuance(&config, 0).is_err());
    }

    #[test]
    fn target_deposit_plan_is_continuous_at_breakpoints() -> Result<()> {
        for config in [Config::mainnet(), Config::minimal()] {
            let per_year = config.epochs_per_year.get();
            let early_end = config.deposit_plan_early_end * per_year;
            let later_end = config.deposit_plan_later_end * per_year;

            let before_early_end = get_target_deposit_plan(&config, early_end - 1)?;
            let at_early_end = get_target_deposit_plan(&config, early_end)?;
            let before_later_end = get_target_deposit_plan(&config, later_end - 1)?;
            let at_later_end = get_target_deposit_plan(&config, later_end)?;

            assert_eq!(
                at_early_end - before_early_end,
                config.deposit_plan_early_slope,
            );
            assert_eq!(at_later_end - before_later_end, config.deposit_plan_later_slope);
            assert_eq!(
                get_target_deposit_plan(&config, FAR_FUTURE_EPOCH)?,
                config.deposit_plan_final,
            );
        }

        Ok(())
    }

    #[test]
    fn target_deposit_plan_is_non_decreasing() -> Result<()> {
        let config = Config::minimal();

        let plan = (0..10 * config.epochs_per_year.get())
            .step_by(97)
            .map(|epoch| get_target_deposit_plan(&config, epoch))
            .collect::<Result<Vec<_>>>()?;

        assert!(plan.iter().tuple_windows().all(|(a, b)| a <= b));

        Ok(())
    }

    #[test]
    fn reserve_usage_is_capped_by_reserves() -> Result<()> {
        let config = Config::mainnet();
        let issuance = get_epoch_issuance(&config, 0)?;

        let uncapped = get_total_reward_with_reserve_usage(&config, 0, u64::MAX, 10_000)?;
        let capped = get_total_reward_with_reserve_usage(&config, 0, 5, 10_000)?;
        let empty = get_total_reward_with_reserve_usage(&config, 0, 0, 10_000)?;

        assert_eq!(uncapped.reserve_usage, 10 * TOKEN * 10_000 / 82_125);
        assert_eq!(uncapped.total_reward, issuance + uncapped.reserve_usage);
        assert_eq!(capped.reserve_usage, 5);
        assert_eq!(capped.total_reward, issuance + 5);
        assert_eq!(empty.reserve_usage, 0);
        assert_eq!(empty.total_reward, issuance);

        Ok(())
    }

    #[test]
    fn rewards_per_increment_divide_by_active_increments() -> Result<()> {
        let config = Config::mainnet();
        let total_active_balance = 1000 * 32 * TOKEN;

        let RewardWithReserveUsage {
            total_reward,
            reserve_usage,
        } = get_total_reward_with_reserve_usage(&config, 0, u64::MAX, 10_000)?;

        let per_increment =
            get_rewards_per_increment::<Minimal>(&config, 0, u64::MAX, 10_000, total_active_balance)?;

        assert_eq!(per_increment.base_reward, total_reward / 32_000);
        assert_eq!(per_increment.reserve_usage, reserve_usage / 32_000);

        let error = get_rewards_per_increment::<Minimal>(&config, 0, 0, 0, 0)
            .expect_err("zero active increments");

        assert_eq!(error.downcast_ref(), Some(&ArithmeticError::DivisionByZero));

        Ok(())
    }

    #[test]
    fn reward_adjustment_factor_moves_toward_target() -> Result<()> {
        let config = Config::minimal();
        let target = get_target_deposit_plan(&config, 1)?;
        let delta = config.reward_adjustment_factor_delta;
        let max = get_max_reward_adjustment_factor(&config, 1)?;

        assert_eq!(
            compute_reward_adjustment_factor(&config, 5_000, target + 1, 1)?,
            5_000 - delta,
        );
        assert_eq!(
            compute_reward_adjustment_factor(&config, 5_000, target - 1, 1)?,
            5_000 + delta,
        );
        assert_eq!(compute_reward_adjustment_factor(&config, 5_000, target, 1)?, 5_000);
        assert_eq!(compute_reward_adjustment_factor(&config, 1, target + 1, 1)?, 0);
        assert_eq!(compute_reward_adjustment_factor(&config, max, target - 1, 1)?, max);

        Ok(())
    }

    #[test]
    fn reward_adjustment_factor_cap_uses_year_of_next_epoch() -> Result<()> {
        let config = Config::minimal();
        let per_year = config.epochs_per_year.get();
        let first_year_max = get_max_reward_adjustment_factor(&config, 0)?;
        let second_year_max = get_max_reward_adjustment_factor(&config, per_year)?;

        assert!(second_year_max < first_year_max);
        assert_eq!(
            compute_reward_adjustment_factor(&config, first_year_max, 0, per_year)?,
            second_year_max,
        );

        Ok(())
    }
}
