use typenum::Unsigned as _;
use types::{
    combined::BeaconState,
    nonstandard::Phase,
    phase0::{
        containers::Validator,
        primitives::{Gwei, Slot},
    },
    preset::{Minimal, Preset},
};

pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;
pub const SLOTS_PER_EPOCH: Slot = <Minimal as Preset>::SlotsPerEpoch::U64;

pub fn active_validator() -> Validator {
    Validator {
        effective_balance: MAX_EFFECTIVE_BALANCE,
        principal_balance: MAX_EFFECTIVE_BALANCE,
        activation_eligibility_epoch: 0,
        activation_epoch: 0,
        ..Validator::default()
    }
}

pub fn state(phase: Phase, slot: Slot, validator_count: usize) -> BeaconState<Minimal> {
    BeaconState::new(
        phase,
        slot,
        vec![active_validator(); validator_count],
        vec![MAX_EFFECTIVE_BALANCE; validator_count],
    )
}

/// Four validators at the start of epoch 2 that participated in epoch 1 with no flags, source,
/// source and target, and all three flags.
pub fn participation_fixture(phase: Phase) -> BeaconState<Minimal> {
    let mut state = state(phase, 2 * SLOTS_PER_EPOCH, 4);
    state.previous_epoch_participation = vec![0b000, 0b001, 0b011, 0b111];
    state
}
