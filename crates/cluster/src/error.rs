use reqwest::StatusCode;
use thiserror::Error;

use crate::ClusterAdminError;

/// Errors returned by [`HttpClusterClient`](crate::HttpClusterClient).
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or the response body not read.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The cluster answered with a non-2xx status.
    #[error("unexpected status {status} from {path}")]
    UnexpectedStatus {
        /// The status the cluster answered with.
        status: StatusCode,

        /// The request path that failed.
        path: String,
    },
}

impl ClusterAdminError for Error {}
