use thiserror::Error;

use esroll_cluster::RecoveryError;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors aborting a deployment. The first failing step surfaces here; the
/// cluster may be left mid-transition, and re-running the deployment with
/// the same target is the recovery path.
#[derive(Debug, Error)]
pub enum Error {
    /// An orchestration platform call failed.
    #[error("orchestration platform call failed: {0}")]
    Platform(#[source] BoxedError),

    /// A cluster-admin call failed.
    #[error("cluster-admin call failed: {0}")]
    Cluster(#[source] BoxedError),

    /// Cluster health did not stabilize.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// No started instance was available to reach the cluster through.
    #[error("no started instance to reach the cluster through")]
    NoReachableInstance,

    /// The component's instance list does not match its releases.
    #[error("component has {actual} instances, expected between {min} and {max}")]
    InconsistentTopology {
        /// Fewest instances the releases allow (all doomed instances
        /// already deleted).
        min: usize,

        /// Most instances the releases allow (both topologies present).
        max: usize,

        /// Instances the component actually has.
        actual: usize,
    },

    /// An instance was not started on the target release after the rollout.
    #[error("instance {instance} is not started on the target release after rollout")]
    Incomplete {
        /// The offending instance.
        instance: String,
    },
}

impl Error {
    pub(crate) fn platform(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Platform(Box::new(err))
    }

    pub(crate) fn cluster(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Cluster(Box::new(err))
    }
}
