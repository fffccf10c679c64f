// The epoch transition runs as a fixed sequence of stages over an `EpochIntermediates` value:
//
// 1. `phase0::precompute` or `altair::precompute` builds the per-validator snapshot.
// 2. `phase0::process_attestations` or `altair::process_participation` marks attesters and
//    recomputes aggregate balances.
// 3. `altair::process_inactivity_updates` advances inactivity and bail-out scores.
// 4. `phase0::epoch_deltas` or `altair::epoch_deltas` computes rewards and penalties.
// 5. `unphased::process_rewards_and_penalties` applies them to balances and reserves.
// 6. `alpaca::process_reward_adjustment_factor_update` and
//    `altair::process_participation_flag_updates` prepare the state for the next epoch.
//
// `combined` selects the stages for the phase of the state.

pub mod combined;

pub mod unphased {
    pub use epoch_intermediates::{EpochDeltas, EpochIntermediates, Statistics, ValidatorSummary};
    pub use epoch_processing::{
        process_rewards_and_penalties, should_process_rewards_and_penalties, EpochReport,
    };
    pub use error::Error;

    pub(crate) use epoch_intermediates::{ensure_length, ensure_phase};

    mod epoch_intermediates;
    mod epoch_processing;
    mod error;
}

pub mod phase0 {
    pub use epoch_intermediates::{epoch_deltas, precompute, process_attestations};

    pub(crate) use epoch_processing::epoch_report;

    mod epoch_intermediates;
    mod epoch_processing;
}

pub mod altair {
    pub use epoch_intermediates::{epoch_deltas, precompute, process_participation};
    pub use epoch_processing::{process_inactivity_updates, process_participation_flag_updates};

    pub(crate) use epoch_processing::epoch_report;

    mod epoch_intermediates;
    mod epoch_processing;
}

pub mod alpaca {
    pub use epoch_processing::{bail_out_candidates, process_reward_adjustment_factor_update};

    mod epoch_processing;
}

#[cfg(test)]
mod test_utils;
