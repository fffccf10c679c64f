use core::num::NonZeroU64;

use easy_ext::ext;
use thiserror::Error;
use typenum::{NonZero, Unsigned};

/// Failure of a checked operation on balances, scores or epochs.
///
/// Consensus code must fail deterministically instead of wrapping,
/// so every fallible operation in [`SafeArith`] reports one of these.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ArithmeticError {
    #[error("arithmetic operation overflowed")]
    Overflow,
    #[error("arithmetic operation underflowed")]
    Underflow,
    #[error("attempted to divide by zero")]
    DivisionByZero,
}

#[ext(U64Ext)]
pub impl u64 {
    #[inline]
    #[must_use]
    fn prev_multiple_of(self, factor: NonZeroU64) -> Self {
        self - self % factor
    }

    #[inline]
    #[must_use]
    fn div_typenum<N: Unsigned + NonZero>(self) -> Self {
        self / N::U64
    }
}

#[ext(SafeArith)]
pub impl u64 {
    #[inline]
    fn safe_add(self, other: Self) -> Result<u64, ArithmeticError> {
        self.checked_add(other).ok_or(ArithmeticError::Overflow)
    }

    #[inline]
    fn safe_sub(self, other: Self) -> Result<u64, ArithmeticError> {
        self.checked_sub(other).ok_or(ArithmeticError::Underflow)
    }

    #[inline]
    fn safe_mul(self, other: Self) -> Result<u64, ArithmeticError> {
        self.checked_mul(other).ok_or(ArithmeticError::Overflow)
    }

    #[inline]
    fn safe_div(self, other: Self) -> Result<u64, ArithmeticError> {
        self.checked_div(other).ok_or(ArithmeticError::DivisionByZero)
    }

    #[inline]
    fn safe_add_assign(&mut self, other: Self) -> Result<(), ArithmeticError> {
        *self = self.safe_add(other)?;
        Ok(())
    }
}

/// Sums `values`, failing on the first partial sum that does not fit in `u64`.
pub fn safe_sum(values: impl IntoIterator<Item = u64>) -> Result<u64, ArithmeticError> {
    values.into_iter().try_fold(0, u64::safe_add)
}
