use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use esroll_platform::PlatformError;

/// Errors from the HTTP platform client.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level request failure.
    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The CA certificate could not be read.
    #[error("could not read CA certificate {path}: {source}")]
    Certificate {
        /// Path the certificate was read from.
        path: PathBuf,

        /// Underlying read failure.
        #[source]
        source: std::io::Error,
    },

    /// The platform answered with a non-success status.
    #[error("platform returned {status} for {path}")]
    UnexpectedStatus {
        /// The response status.
        status: StatusCode,

        /// The request path.
        path: String,
    },

    /// An instance did not reach the awaited state in time.
    #[error("instance {instance} did not become {state} in time")]
    WaitTimeout {
        /// The instance being waited on.
        instance: String,

        /// The state that was awaited.
        state: &'static str,
    },
}

impl PlatformError for Error {}
