use thiserror::Error;
use types::{
    nonstandard::Phase,
    phase0::primitives::{CommitteeIndex, Slot},
};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("{field} has {actual} entries but state has {expected} validators")]
    SnapshotLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{stage} cannot process a state in {phase}")]
    UnsupportedPhase { stage: &'static str, phase: Phase },
    #[error("pending attestation for slot {slot} committee {index} has zero inclusion delay")]
    ZeroInclusionDelay { slot: Slot, index: CommitteeIndex },
}
