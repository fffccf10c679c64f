use anyhow::Result;

use crate::{
    altair::primitives::ParticipationFlags,
    nonstandard::Phase,
    phase0::{
        containers::{Checkpoint, PendingAttestation, Validator},
        primitives::{CommitteeIndex, Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
};

/// State accessors the epoch transition reads and writes.
///
/// Fork-gated accessors fail with [`Error::FieldUnavailable`] when called on a state whose phase
/// lacks the field. Setters that take per-validator arrays fail with [`Error::LengthMismatch`]
/// unless the array has exactly one element per validator, leaving the state untouched.
///
/// [`Error::FieldUnavailable`]: crate::error::Error::FieldUnavailable
/// [`Error::LengthMismatch`]: crate::error::Error::LengthMismatch
pub trait BeaconState<P: Preset> {
    fn phase(&self) -> Phase;
    fn slot(&self) -> Slot;
    fn validators(&self) -> &[Validator];
    fn balances(&self) -> &[Gwei];
    fn finalized_checkpoint(&self) -> Checkpoint;

    /// Identifies the validator set and epoch for caching aggregate balances.
    fn balance_cache_seed(&self) -> H256;

    fn block_root_at_slot(&self, slot: Slot) -> Result<H256>;
    fn beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Result<&[ValidatorIndex]>;

    // Phase 0
    fn previous_epoch_attestations(&self) -> Result<&[PendingAttestation]>;
    fn current_epoch_attestations(&self) -> Result<&[PendingAttestation]>;

    // Altair
    fn previous_epoch_participation(&self) -> Result<&[ParticipationFlags]>;
    fn current_epoch_participation(&self) -> Result<&[ParticipationFlags]>;
    fn inactivity_scores(&self) -> Result<&[u64]>;

    // Alpaca
    fn bail_out_scores(&self) -> Result<&[u64]>;
    fn reward_adjustment_factor(&self) -> Result<u64>;
    fn reserves(&self) -> Result<Gwei>;

    fn set_balances(&mut self, balances: Vec<Gwei>) -> Result<()>;
    fn set_previous_epoch_participation(&mut self, flags: Vec<ParticipationFlags>) -> Result<()>;
    fn set_current_epoch_participation(&mut self, flags: Vec<ParticipationFlags>) -> Result<()>;
    fn set_inactivity_scores(&mut self, scores: Vec<u64>) -> Result<()>;
    fn set_bail_out_scores(&mut self, scores: Vec<u64>) -> Result<()>;
    fn set_reward_adjustment_factor(&mut self, factor: u64) -> Result<()>;
    fn set_reserves(&mut self, reserves: Gwei) -> Result<()>;

    #[inline]
    fn validator_count(&self) -> usize {
        self.validators().len()
    }

    #[inline]
    fn finalized_epoch(&self) -> Epoch {
        self.finalized_checkpoint().epoch
    }
}
