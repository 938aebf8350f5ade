use thiserror::Error;

use esroll_cluster::ClusterAdminError;

/// Errors produced by the mock cluster, always by prior arrangement.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A scripted health probe failure.
    #[error("scripted health probe failure")]
    Probe,

    /// An operation armed to fail via
    /// [`MockCluster::fail_on`](crate::MockCluster::fail_on).
    #[error("scripted failure for {0}")]
    Armed(&'static str),
}

impl ClusterAdminError for Error {}
