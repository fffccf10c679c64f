use core::time::Duration;

use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("could not obtain balance cache lock in {} ms", timeout.as_millis())]
    LockTimeout { timeout: Duration },
    #[error("computation in progress did not finish in {} ms", timeout.as_millis())]
    ComputationTimeout { timeout: Duration },
    #[error("computation in progress finished without producing a value")]
    ComputationAbandoned,
}
