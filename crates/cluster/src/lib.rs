//! Typed operations over the cluster-admin API of the search engine:
//! health reads, the safety settings used during rolling deployments, and
//! the hysteresis-based shard-recovery wait.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod http;
mod recovery;

pub use error::Error;
pub use http::HttpClusterClient;
pub use recovery::{RecoveryError, wait_for_shard_recovery};

use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node-level setting restricting quorum to a number of master-eligible
/// nodes.
pub const SETTING_MIN_MASTER_NODES: &str = "discovery.zen.minimum_master_nodes";

/// Cluster setting naming the node attributes the allocator uses to avoid
/// co-locating shard copies.
pub const SETTING_AWARENESS_ATTRIBUTES: &str = "cluster.routing.allocation.awareness.attributes";

/// Cluster setting bounding how many shards may rebalance concurrently.
pub const SETTING_CONCURRENT_REBALANCE: &str =
    "cluster.routing.allocation.cluster_concurrent_rebalance";

/// Cluster setting selecting which shard allocations are permitted.
pub const SETTING_ALLOCATION_ENABLE: &str = "cluster.routing.allocation.enable";

/// Concurrent-rebalance budget restored when rebalancing is re-enabled.
pub const DEFAULT_CONCURRENT_REBALANCE: u32 = 2;

/// Overall health of the cluster.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All primary and replica shards are allocated.
    Green,

    /// All primaries allocated, some replicas are not.
    Yellow,

    /// At least one primary shard is unallocated.
    Red,

    /// Anything the cluster reports that we do not recognize.
    #[serde(other)]
    Other,
}

/// A snapshot of cluster health, refreshed on every poll and never
/// persisted.
#[derive(Clone, Debug, Deserialize)]
pub struct ClusterHealth {
    /// Overall cluster status.
    pub status: HealthStatus,

    /// Number of data nodes currently in the cluster.
    pub number_of_data_nodes: u32,

    /// Number of shards being initialized.
    pub initializing_shards: u32,

    /// Number of shards being moved between nodes.
    pub relocating_shards: u32,
}

impl ClusterHealth {
    /// Whether any shard movement is in flight.
    #[must_use]
    pub const fn shards_moving(&self) -> bool {
        self.initializing_shards > 0 || self.relocating_shards > 0
    }
}

/// A partial cluster-settings patch: a `transient` tier cleared on cluster
/// restart and a `persistent` tier that survives it. Only written, never
/// read back.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ClusterSettings {
    /// Settings cleared when the cluster restarts.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub transient: Map<String, Value>,

    /// Settings that survive a cluster restart.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub persistent: Map<String, Value>,
}

impl ClusterSettings {
    /// A patch setting a single persistent key.
    #[must_use]
    pub fn persistent(key: &str, value: impl Into<Value>) -> Self {
        let mut settings = Self::default();
        settings.persistent.insert(key.to_string(), value.into());
        settings
    }

    /// A patch setting a single transient key.
    #[must_use]
    pub fn transient(key: &str, value: impl Into<Value>) -> Self {
        let mut settings = Self::default();
        settings.transient.insert(key.to_string(), value.into());
        settings
    }
}

/// Marker trait for [`ClusterAdmin`] errors.
pub trait ClusterAdminError: Debug + StdError + Send + Sync + 'static {}

/// Typed wrapper over the cluster-admin API. Every method maps to exactly
/// one read or one settings patch; writes are fire-and-confirm (HTTP success
/// means applied) and are never read back to verify. Retries live in the
/// caller, not here.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// The error type for this client.
    type Error: ClusterAdminError;

    /// Read the current cluster health snapshot.
    async fn health(&self) -> Result<ClusterHealth, Self::Error>;

    /// Restrict master quorum to `min` master-eligible nodes.
    async fn set_min_master_nodes(&self, min: u32) -> Result<(), Self::Error>;

    /// Name the awareness attributes the allocator should steer around.
    async fn set_awareness_attrs(&self, attrs: &[String]) -> Result<(), Self::Error>;

    /// Clear all awareness attributes.
    async fn clear_awareness_attrs(&self) -> Result<(), Self::Error>;

    /// Set the concurrent-rebalance budget to zero.
    async fn disable_shard_rebalancing(&self) -> Result<(), Self::Error>;

    /// Restore the default concurrent-rebalance budget.
    async fn enable_shard_rebalancing(&self) -> Result<(), Self::Error>;

    /// Restrict shard allocation to new primaries only.
    async fn disable_shard_allocation(&self) -> Result<(), Self::Error>;

    /// Allow all shard allocation.
    async fn enable_shard_allocation(&self) -> Result<(), Self::Error>;

    /// Trigger a synced flush so a stopped node can skip translog replay on
    /// restart.
    async fn flush_translog(&self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn persistent_patch_omits_transient_tier() {
        let settings = ClusterSettings::persistent(SETTING_ALLOCATION_ENABLE, "all");

        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({ "persistent": { "cluster.routing.allocation.enable": "all" } }),
        );
    }

    #[test]
    fn transient_patch_omits_persistent_tier() {
        let settings = ClusterSettings::transient(SETTING_CONCURRENT_REBALANCE, 0);

        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({ "transient": { "cluster.routing.allocation.cluster_concurrent_rebalance": 0 } }),
        );
    }

    #[test]
    fn unknown_health_status_is_other() {
        let health: ClusterHealth = serde_json::from_value(json!({
            "status": "purple",
            "number_of_data_nodes": 3,
            "initializing_shards": 0,
            "relocating_shards": 0,
        }))
        .unwrap();

        assert_eq!(health.status, HealthStatus::Other);
        assert!(!health.shards_moving());
    }
}
