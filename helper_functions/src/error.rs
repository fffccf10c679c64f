use thiserror::Error;
use types::phase0::primitives::ValidatorIndex;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error(
        "aggregation bitlist length {aggregation_bitlist_length} \
         does not match committee length {committee_length}"
    )]
    CommitteeLengthMismatch {
        aggregation_bitlist_length: usize,
        committee_length: usize,
    },
    #[error("per-year schedule {name} is empty")]
    ScheduleEmpty { name: &'static str },
    #[error("validator index {validator_index} is out of bounds")]
    ValidatorIndexOutOfBounds { validator_index: ValidatorIndex },
}
