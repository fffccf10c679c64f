pub use crate::{
    balance_cache::{BalanceCache, BalanceCacheKey},
    computation_cache::ComputationCache,
    error::Error,
};

mod balance_cache;
mod computation_cache;
mod error;
