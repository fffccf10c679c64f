use bitvec::{order::Lsb0, vec::BitVec};
use serde::{Deserialize, Serialize};

use crate::phase0::{
    consts::FAR_FUTURE_EPOCH,
    primitives::{CommitteeIndex, Epoch, Gwei, Slot, ValidatorIndex, H256},
};

pub type AggregationBits = BitVec<u8, Lsb0>;

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Deserialize, Serialize,
)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// An attestation as recorded in a Phase 0 state.
///
/// `aggregation_bits` is indexed by position in the committee identified by
/// `data.slot` and `data.index`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PendingAttestation {
    pub aggregation_bits: AggregationBits,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Validator {
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    // Only meaningful starting with Alpaca. Earlier phases leave it at zero.
    #[serde(default)]
    pub principal_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            withdrawal_credentials: H256::zero(),
            effective_balance: 0,
            principal_balance: 0,
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }
}
