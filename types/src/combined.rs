use core::marker::PhantomData;
use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use typenum::Unsigned as _;

use crate::{
    altair::primitives::ParticipationFlags,
    error::Error,
    nonstandard::Phase,
    phase0::{
        containers::{Checkpoint, PendingAttestation, Validator},
        primitives::{CommitteeIndex, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
    traits,
};

/// In-memory state holding the fields of every supported phase.
///
/// Fields that do not exist in [`Self::phase`] are kept empty and are rejected by the
/// [`traits::BeaconState`] accessors.
#[expect(
    clippy::partial_pub_fields,
    reason = "The marker is an implementation detail. Every other field is plain data."
)]
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconState<P: Preset> {
    pub phase: Phase,
    pub slot: Slot,
    pub validators: Vec<Validator>,
    pub balances: Vec<Gwei>,
    pub finalized_checkpoint: Checkpoint,
    pub randao_mix: H256,
    /// Circular buffer indexed by `slot % SlotsPerHistoricalRoot`.
    pub block_roots: Vec<H256>,

    // Phase 0
    pub committees: BTreeMap<(Slot, CommitteeIndex), Vec<ValidatorIndex>>,
    pub previous_epoch_attestations: Vec<PendingAttestation>,
    pub current_epoch_attestations: Vec<PendingAttestation>,

    // Altair
    pub previous_epoch_participation: Vec<ParticipationFlags>,
    pub current_epoch_participation: Vec<ParticipationFlags>,
    pub inactivity_scores: Vec<u64>,

    // Alpaca
    pub bail_out_scores: Vec<u64>,
    pub reward_adjustment_factor: u64,
    pub reserves: Gwei,

    phantom: PhantomData<P>,
}

impl<P: Preset> BeaconState<P> {
    /// Creates a state with zeroed per-validator arrays for every field `phase` has.
    #[must_use]
    pub fn new(phase: Phase, slot: Slot, validators: Vec<Validator>, balances: Vec<Gwei>) -> Self {
        let validator_count = validators.len();
        let flag_count = if phase.uses_participation_flags() {
            validator_count
        } else {
            0
        };
        let bail_out_count = if phase.has_tokenomics() {
            validator_count
        } else {
            0
        };

        Self {
            phase,
            slot,
            validators,
            balances,
            block_roots: vec![H256::zero(); P::SlotsPerHistoricalRoot::USIZE],
            previous_epoch_participation: vec![0; flag_count],
            current_epoch_participation: vec![0; flag_count],
            inactivity_scores: vec![0; flag_count],
            bail_out_scores: vec![0; bail_out_count],
            ..Self::default()
        }
    }

    fn ensure_phase(&self, field: &'static str, available: bool) -> Result<()> {
        ensure!(
            available,
            Error::FieldUnavailable {
                field,
                phase: self.phase,
            },
        );

        Ok(())
    }

    fn ensure_length(&self, field: &'static str, actual: usize) -> Result<()> {
        let expected = self.validators.len();

        ensure!(
            actual == expected,
            Error::LengthMismatch {
                field,
                expected,
                actual,
            },
        );

        Ok(())
    }

    fn ensure_phase0(&self, field: &'static str) -> Result<()> {
        self.ensure_phase(field, !self.phase.uses_participation_flags())
    }

    fn ensure_altair(&self, field: &'static str) -> Result<()> {
        self.ensure_phase(field, self.phase.uses_participation_flags())
    }

    fn ensure_alpaca(&self, field: &'static str) -> Result<()> {
        self.ensure_phase(field, self.phase.has_tokenomics())
    }
}

impl<P: Preset> traits::BeaconState<P> for BeaconState<P> {
    #[inline]
    fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    fn slot(&self) -> Slot {
        self.slot
    }

    #[inline]
    fn validators(&self) -> &[Validator] {
        &self.validators
    }

    #[inline]
    fn balances(&self) -> &[Gwei] {
        &self.balances
    }

    #[inline]
    fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    #[inline]
    fn balance_cache_seed(&self) -> H256 {
        self.randao_mix
    }

    fn block_root_at_slot(&self, slot: Slot) -> Result<H256> {
        let in_range = slot < self.slot
            && self.slot <= slot.saturating_add(P::SlotsPerHistoricalRoot::U64);

        ensure!(
            in_range,
            Error::BlockRootOutOfRange {
                slot,
                state_slot: self.slot,
            },
        );

        let index = usize::try_from(slot % P::SlotsPerHistoricalRoot::U64)?;

        self.block_roots.get(index).copied().ok_or_else(|| {
            Error::BlockRootOutOfRange {
                slot,
                state_slot: self.slot,
            }
            .into()
        })
    }

    fn beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Result<&[ValidatorIndex]> {
        self.ensure_phase0("committees")?;

        self.committees
            .get(&(slot, index))
            .map(Vec::as_slice)
            .ok_or_else(|| Error::CommitteeUnavailable { slot, index }.into())
    }

    fn previous_epoch_attestations(&self) -> Result<&[PendingAttestation]> {
        self.ensure_phase0("previous_epoch_attestations")?;
        Ok(&self.previous_epoch_attestations)
    }

    fn current_epoch_attestations(&self) -> Result<&[PendingAttestation]> {
        self.ensure_phase0("current_epoch_attestations")?;
        Ok(&self.current_epoch_attestations)
    }

    fn previous_epoch_participation(&self) -> Result<&[ParticipationFlags]> {
        self.ensure_altair("previous_epoch_participation")?;
        Ok(&self.previous_epoch_participation)
    }

    fn current_epoch_participation(&self) -> Result<&[ParticipationFlags]> {
        self.ensure_altair("current_epoch_participation")?;
        Ok(&self.current_epoch_participation)
    }

    fn inactivity_scores(&self) -> Result<&[u64]> {
        self.ensure_altair("inactivity_scores")?;
        Ok(&self.inactivity_scores)
    }

    fn bail_out_scores(&self) -> Result<&[u64]> {
        self.ensure_alpaca("bail_out_scores")?;
        Ok(&self.bail_out_scores)
    }

    fn reward_adjustment_factor(&self) -> Result<u64> {
        self.ensure_alpaca("reward_adjustment_factor")?;
        Ok(self.reward_adjustment_factor)
    }

    fn reserves(&self) -> Result<Gwei> {
        self.ensure_alpaca("reserves")?;
        Ok(self.reserves)
    }

    fn set_balances(&mut self, balances: Vec<Gwei>) -> Result<()> {
        self.ensure_length("balances", balances.len())?;
        self.balances = balances;
        Ok(())
    }

    fn set_previous_epoch_participation(&mut self, flags: Vec<ParticipationFlags>) -> Result<()> {
        self.ensure_altair("previous_epoch_participation")?;
        self.ensure_length("previous_epoch_participation", flags.len())?;
        self.previous_epoch_participation = flags;
        Ok(())
    }

    fn set_current_epoch_participation(&mut self, flags: Vec<ParticipationFlags>) -> Result<()> {
        self.ensure_altair("current_epoch_participation")?;
        self.ensure_length("current_epoch_participation", flags.len())?;
        self.current_epoch_participation = flags;
        Ok(())
    }

    fn set_inactivity_scores(&mut self, scores: Vec<u64>) -> Result<()> {
        self.ensure_altair("inactivity_scores")?;
        self.ensure_length("inactivity_scores", scores.len())?;
        self.inactivity_scores = scores;
        Ok(())
    }

    fn set_bail_out_scores(&mut self, scores: Vec<u64>) -> Result<()> {
        self.ensure_alpaca("bail_out_scores")?;
        self.ensure_length("bail_out_scores", scores.len())?;
        self.bail_out_scores = scores;
        Ok(())
    }

    fn set_reward_adjustment_factor(&mut self, factor: u64) -> Result<()> {
        self.ensure_alpaca("reward_adjustment_factor")?;
        self.reward_adjustment_factor = factor;
        Ok(())
    }

    fn set_reserves(&mut self, reserves: Gwei) -> Result<()> {
        self.ensure_alpaca("reserves")?;
        self.reserves = reserves;
        Ok(())
    }
}
