use anyhow::Result;
use arithmetic::SafeArith as _;
use types::{phase0::primitives::Gwei, preset::Preset};

/// Adds `delta` to `balance`, leaving it unchanged if the sum overflows.
#[inline]
pub fn increase_balance(balance: &mut Gwei, delta: Gwei) -> Result<()> {
    balance.safe_add_assign(delta)?;
    Ok(())
}

#[inline]
pub fn decrease_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_sub(delta);
}

pub fn clamp_balance<P: Preset>(balance: &mut Gwei) {
    *balance = P::EFFECTIVE_BALANCE_INCREMENT.get().max(*balance);
}
