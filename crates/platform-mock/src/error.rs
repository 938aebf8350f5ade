use thiserror::Error;

use esroll_platform::PlatformError;

/// Errors produced by the mock platform, always by prior arrangement.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A lifecycle call armed to fail via
    /// [`MockPlatform::fail_on`](crate::MockPlatform::fail_on).
    #[error("scripted failure for {0}")]
    Armed(&'static str),

    /// The deployer asked for an instance the platform does not know.
    #[error("unknown instance {0}")]
    UnknownInstance(String),
}

impl PlatformError for Error {}
