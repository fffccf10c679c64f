use core::{num::NonZeroUsize, time::Duration};

use anyhow::Result;
use helper_functions::accessors;
use nonzero_ext::nonzero;
use types::{
    phase0::primitives::{Epoch, Gwei, H256},
    preset::Preset,
    traits::BeaconState,
};

use crate::computation_cache::ComputationCache;

const DEFAULT_CAPACITY: NonZeroUsize = nonzero!(16_usize);
const DEFAULT_TRY_LOCK_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fingerprint of the inputs to aggregate balance scans.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BalanceCacheKey {
    pub seed: H256,
    pub epoch: Epoch,
    pub validator_count: usize,
}

impl BalanceCacheKey {
    #[must_use]
    pub fn new<P: Preset>(state: &impl BeaconState<P>) -> Self {
        Self {
            seed: state.balance_cache_seed(),
            epoch: accessors::get_current_epoch(state),
            validator_count: state.validator_count(),
        }
    }
}

/// Caches total active balance and total balance with queue.
///
/// Intended to be owned by whatever drives state transitions and passed down explicitly.
/// Separate instances share nothing.
pub struct BalanceCache {
    total_active_balance: ComputationCache<BalanceCacheKey, Gwei>,
    total_balance_with_queue: ComputationCache<BalanceCacheKey, Gwei>,
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TRY_LOCK_TIMEOUT, DEFAULT_WAIT_TIMEOUT)
    }
}

impl BalanceCache {
    #[must_use]
    pub fn new(capacity: NonZeroUsize, try_lock_timeout: Duration, wait_timeout: Duration) -> Self {
        Self {
            total_active_balance: ComputationCache::new(capacity, try_lock_timeout, wait_timeout),
            total_balance_with_queue: ComputationCache::new(
                capacity,
                try_lock_timeout,
                wait_timeout,
            ),
        }
    }

    pub fn total_active_balance<P: Preset>(&self, state: &impl BeaconState<P>) -> Result<Gwei> {
        self.total_active_balance
            .get_or_try_compute(BalanceCacheKey::new(state), || {
                accessors::compute_total_active_balance(state)
            })
    }

    pub fn total_balance_with_queue<P: Preset>(&self, state: &impl BeaconState<P>) -> Result<Gwei> {
        self.total_balance_with_queue
            .get_or_try_compute(BalanceCacheKey::new(state), || {
                accessors::compute_total_balance_with_queue(state)
            })
    }

    /// Drops cached totals for `state`.
    ///
    /// Needed when effective balances change without changing the key, as they do during
    /// effective balance updates at the end of an epoch transition.
    pub fn invalidate<P: Preset>(&self, state: &impl BeaconState<P>) -> Result<()> {
        let key = BalanceCacheKey::new(state);
        self.total_active_balance.invalidate(&key)?;
        self.total_balance_with_queue.invalidate(&key)
    }

    pub fn clear(&self) -> Result<()> {
        self.total_active_balance.clear()?;
        self.total_balance_with_queue.clear()
    }
}

#[cfg(test)]
mod tests {
    use types::{
        combined::BeaconState as CombinedBeaconState, nonstandard::Phase,
        phase0::containers::Validator, preset::Minimal,
    };

    use super::*;

    const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

    fn state(validator_count: usize) -> CombinedBeaconState<Minimal> {
        let validator = Validator {
            effective_balance: MAX_EFFECTIVE_BALANCE,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            ..Validator::default()
        };

        CombinedBeaconState::new(
            Phase::Alpaca,
            16,
            vec![validator; validator_count],
            vec![MAX_EFFECTIVE_BALANCE; validator_count],
        )
    }

    #[test]
    fn totals_are_computed_per_key() -> Result<()> {
        let cache = BalanceCache::default();
        let mut state = state(4);

        assert_eq!(cache.total_active_balance(&state)?, 4 * MAX_EFFECTIVE_BALANCE);
        assert_eq!(cache.total_balance_with_queue(&state)?, 4 * MAX_EFFECTIVE_BALANCE);

        // Same key, so the stale total is served.
        state.validators[0].effective_balance = 0;

        assert_eq!(cache.total_active_balance(&state)?, 4 * MAX_EFFECTIVE_BALANCE);

        cache.invalidate(&state)?;

        assert_eq!(cache.total_active_balance(&state)?, 3 * MAX_EFFECTIVE_BALANCE);

        state.randao_mix = H256::repeat_byte(1);
        state.validators[1].effective_balance = 0;

        assert_eq!(cache.total_active_balance(&state)?, 2 * MAX_EFFECTIVE_BALANCE);

        Ok(())
    }

    #[test]
    fn separate_instances_do_not_share_entries() -> Result<()> {
        let first = BalanceCache::default();
        let second = BalanceCache::default();
        let mut state = state(2);

        assert_eq!(first.total_active_balance(&state)?, 2 * MAX_EFFECTIVE_BALANCE);

        state.validators[0].effective_balance = 0;

        assert_eq!(second.total_active_balance(&state)?, MAX_EFFECTIVE_BALANCE);
        assert_eq!(first.total_active_balance(&state)?, 2 * MAX_EFFECTIVE_BALANCE);

        first.clear()?;

        assert_eq!(first.total_active_balance(&state)?, MAX_EFFECTIVE_BALANCE);

        Ok(())
    }

    #[test]
    fn key_tracks_validator_count_and_epoch() {
        let small = state(2);
        let large = state(3);
        let mut later = state(2);
        later.slot = 24;

        assert_ne!(BalanceCacheKey::new(&small), BalanceCacheKey::new(&large));
        assert_ne!(BalanceCacheKey::new(&small), BalanceCacheKey::new(&later));
        assert_eq!(BalanceCacheKey::new(&small), BalanceCacheKey::new(&state(2)));
    }
}
