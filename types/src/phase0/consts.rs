use core::num::NonZeroU64;

use nonzero_ext::nonzero;

use crate::phase0::primitives::{Epoch, Slot};

pub const BASE_REWARDS_PER_EPOCH: NonZeroU64 = nonzero!(4_u64);
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const FAR_FUTURE_SLOT: Slot = Slot::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
