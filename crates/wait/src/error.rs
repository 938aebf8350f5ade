use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`wait_for`](crate::wait_for).
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The check reported a fatal error.
    #[error(transparent)]
    Check(E),

    /// The overall deadline elapsed before the check reported ready.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
