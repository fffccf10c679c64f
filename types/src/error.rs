use thiserror::Error;

use crate::{
    nonstandard::Phase,
    phase0::primitives::{CommitteeIndex, Slot},
};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("unknown phase discriminator: {value}")]
    UnknownPhase { value: u8 },
    #[error("{field} is not present in {phase} states")]
    FieldUnavailable { field: &'static str, phase: Phase },
    #[error("{field} has {actual} elements but the registry has {expected} validators")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("block root at slot {slot} is out of range for state at slot {state_slot}")]
    BlockRootOutOfRange { slot: Slot, state_slot: Slot },
    #[error("no committee with index {index} in slot {slot}")]
    CommitteeUnavailable { slot: Slot, index: CommitteeIndex },
}
