//! In-memory mock of the cluster-admin interface for testing deployment
//! flows: health reads follow a script, settings writes are recorded, and
//! individual operations can be armed to fail.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use esroll_cluster::{ClusterAdmin, ClusterHealth, HealthStatus};

/// A recorded settings operation.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Op {
    SetMinMasterNodes(u32),
    SetAwarenessAttrs(Vec<String>),
    ClearAwarenessAttrs,
    DisableShardRebalancing,
    EnableShardRebalancing,
    DisableShardAllocation,
    EnableShardAllocation,
    FlushTranslog,
}

impl Op {
    const fn kind(&self) -> OpKind {
        match self {
            Self::SetMinMasterNodes(_) => OpKind::SetMinMasterNodes,
            Self::SetAwarenessAttrs(_) => OpKind::SetAwarenessAttrs,
            Self::ClearAwarenessAttrs => OpKind::ClearAwarenessAttrs,
            Self::DisableShardRebalancing => OpKind::DisableShardRebalancing,
            Self::EnableShardRebalancing => OpKind::EnableShardRebalancing,
            Self::DisableShardAllocation => OpKind::DisableShardAllocation,
            Self::EnableShardAllocation => OpKind::EnableShardAllocation,
            Self::FlushTranslog => OpKind::FlushTranslog,
        }
    }
}

/// Payload-free operation discriminant, used to arm failures and to count
/// occurrences.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OpKind {
    SetMinMasterNodes,
    SetAwarenessAttrs,
    ClearAwarenessAttrs,
    DisableShardRebalancing,
    EnableShardRebalancing,
    DisableShardAllocation,
    EnableShardAllocation,
    FlushTranslog,
}

impl OpKind {
    const fn name(self) -> &'static str {
        match self {
            Self::SetMinMasterNodes => "set_min_master_nodes",
            Self::SetAwarenessAttrs => "set_awareness_attrs",
            Self::ClearAwarenessAttrs => "clear_awareness_attrs",
            Self::DisableShardRebalancing => "disable_shard_rebalancing",
            Self::EnableShardRebalancing => "enable_shard_rebalancing",
            Self::DisableShardAllocation => "disable_shard_allocation",
            Self::EnableShardAllocation => "enable_shard_allocation",
            Self::FlushTranslog => "flush_translog",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    health_script: Mutex<VecDeque<Result<ClusterHealth, Error>>>,
    health_probes: Mutex<usize>,
    ops: Mutex<Vec<Op>>,
    armed_failures: Mutex<HashSet<OpKind>>,
}

/// Mock implementation of [`ClusterAdmin`]. Cheap to clone; clones share
/// state, so a test can hand one clone to the deployer and keep another for
/// assertions.
#[derive(Clone, Debug, Default)]
pub struct MockCluster {
    inner: Arc<Inner>,
}

impl MockCluster {
    /// A mock whose health reads are green with no shard movement unless
    /// scripted otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted health reading. Once the script runs dry, reads
    /// fall back to a settled green cluster.
    pub fn push_health(&self, health: ClusterHealth) {
        self.inner.health_script.lock().unwrap().push_back(Ok(health));
    }

    /// Queue a scripted health probe failure.
    pub fn push_probe_failure(&self) {
        self.inner
            .health_script
            .lock()
            .unwrap()
            .push_back(Err(Error::Probe));
    }

    /// Arm every future occurrence of `kind` to fail.
    pub fn fail_on(&self, kind: OpKind) {
        self.inner.armed_failures.lock().unwrap().insert(kind);
    }

    /// Every settings operation recorded so far, in call order.
    #[must_use]
    pub fn ops(&self) -> Vec<Op> {
        self.inner.ops.lock().unwrap().clone()
    }

    /// How many recorded operations match `kind`.
    #[must_use]
    pub fn count(&self, kind: OpKind) -> usize {
        self.inner
            .ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.kind() == kind)
            .count()
    }

    /// How many health probes have been issued.
    #[must_use]
    pub fn health_probes(&self) -> usize {
        *self.inner.health_probes.lock().unwrap()
    }

    /// A settled green health snapshot.
    #[must_use]
    pub fn settled_health() -> ClusterHealth {
        ClusterHealth {
            status: HealthStatus::Green,
            number_of_data_nodes: 3,
            initializing_shards: 0,
            relocating_shards: 0,
        }
    }

    fn record(&self, op: Op) -> Result<(), Error> {
        let kind = op.kind();
        if self.inner.armed_failures.lock().unwrap().contains(&kind) {
            return Err(Error::Armed(kind.name()));
        }
        self.inner.ops.lock().unwrap().push(op);
        Ok(())
    }
}

#[async_trait]
impl ClusterAdmin for MockCluster {
    type Error = Error;

    async fn health(&self) -> Result<ClusterHealth, Error> {
        *self.inner.health_probes.lock().unwrap() += 1;
        self.inner
            .health_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::settled_health()))
    }

    async fn set_min_master_nodes(&self, min: u32) -> Result<(), Error> {
        self.record(Op::SetMinMasterNodes(min))
    }

    async fn set_awareness_attrs(&self, attrs: &[String]) -> Result<(), Error> {
        self.record(Op::SetAwarenessAttrs(attrs.to_vec()))
    }

    async fn clear_awareness_attrs(&self) -> Result<(), Error> {
        self.record(Op::ClearAwarenessAttrs)
    }

    async fn disable_shard_rebalancing(&self) -> Result<(), Error> {
        self.record(Op::DisableShardRebalancing)
    }

    async fn enable_shard_rebalancing(&self) -> Result<(), Error> {
        self.record(Op::EnableShardRebalancing)
    }

    async fn disable_shard_allocation(&self) -> Result<(), Error> {
        self.record(Op::DisableShardAllocation)
    }

    async fn enable_shard_allocation(&self) -> Result<(), Error> {
        self.record(Op::EnableShardAllocation)
    }

    async fn flush_translog(&self) -> Result<(), Error> {
        self.record(Op::FlushTranslog)
    }
}
