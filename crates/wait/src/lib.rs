//! Bounded-duration retry loop with pluggable readiness checks.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

/// Outcome of a single readiness probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The awaited condition holds.
    Ready,

    /// Not yet; probe again after the poll interval.
    Pending,
}

/// A readiness check polled by [`wait_for`].
///
/// Checks are free to keep per-invocation state (consecutive-success
/// counters and the like) in their own fields; a fresh check value is
/// expected for every wait.
#[async_trait]
pub trait Check: Send {
    /// The fatal error type of this check.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Probe the awaited condition once. `elapsed` is the time since the
    /// overall wait began.
    async fn poll(&mut self, elapsed: Duration) -> Result<Status, Self::Error>;
}

/// Polls `check` every `interval` until it reports ready, fails, or
/// `timeout` elapses.
///
/// A fatal error from the check is returned immediately; reaching the
/// deadline without the check turning ready returns [`Error::Timeout`].
///
/// # Errors
///
/// Returns an error if the check fails or the deadline elapses.
pub async fn wait_for<C: Check>(
    timeout: Duration,
    interval: Duration,
    check: &mut C,
) -> Result<(), Error<C::Error>> {
    let start = Instant::now();

    loop {
        let elapsed = start.elapsed();

        match check.poll(elapsed).await.map_err(Error::Check)? {
            Status::Ready => return Ok(()),
            Status::Pending => {}
        }

        if elapsed < timeout {
            sleep(interval).await;
        } else {
            return Err(Error::Timeout(timeout));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("probe blew up")]
    struct ProbeError;

    struct Countdown {
        remaining: u32,
        polls: u32,
    }

    #[async_trait]
    impl Check for Countdown {
        type Error = ProbeError;

        async fn poll(&mut self, _elapsed: Duration) -> Result<Status, ProbeError> {
            self.polls += 1;
            if self.remaining == 0 {
                return Ok(Status::Ready);
            }
            self.remaining -= 1;
            Ok(Status::Pending)
        }
    }

    struct AlwaysFatal;

    #[async_trait]
    impl Check for AlwaysFatal {
        type Error = ProbeError;

        async fn poll(&mut self, _elapsed: Duration) -> Result<Status, ProbeError> {
            Err(ProbeError)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn becomes_ready_after_pending_polls() {
        let mut check = Countdown {
            remaining: 3,
            polls: 0,
        };

        wait_for(
            Duration::from_secs(60),
            Duration::from_secs(1),
            &mut check,
        )
        .await
        .unwrap();

        assert_eq!(check.polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_without_ready() {
        let mut check = Countdown {
            remaining: u32::MAX,
            polls: 0,
        };

        let err = wait_for(
            Duration::from_secs(10),
            Duration::from_secs(1),
            &mut check,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        // One poll per second plus the final poll at the deadline.
        assert_eq!(check.polls, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_returns_immediately() {
        let err = wait_for(
            Duration::from_secs(60),
            Duration::from_secs(1),
            &mut AlwaysFatal,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Check(ProbeError)));
    }
}
