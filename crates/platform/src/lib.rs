//! Abstract interface for the orchestration platform that owns components,
//! releases, and instances.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One deployable unit: a named group of instances moving between releases.
///
/// Owned by the orchestration platform and read-only to the deployer; all
/// mutations go through instance lifecycle calls.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Component {
    /// Stable identifier of the component.
    pub id: String,

    /// The release the component is currently running. `None` means the
    /// component has never been deployed.
    pub current_release: Option<Release>,

    /// The release the component should be running.
    pub target_release: Release,

    /// All instances of the component, ordered by [`Instance::num`].
    pub instances: Vec<Instance>,
}

/// An immutable version descriptor for a component.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Release {
    /// Identifier of the release.
    pub id: String,

    /// The number of instances this release wants running.
    pub instance_count: u32,
}

/// One node of a component, running (or about to run) some release.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Instance {
    /// Identifier of the instance. Never reused, even across releases.
    pub id: String,

    /// Stable 0-based ordinal of the instance within the component.
    pub num: u32,

    /// Whether the instance is currently running.
    pub started: bool,

    /// The release this instance is currently running.
    pub release_id: String,

    /// Externally reachable address of the instance, used to reach the
    /// cluster-admin API.
    pub external_address: String,

    /// Volumes attached to the instance, if any.
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

impl Instance {
    /// The 1-based ordinal of the instance. An instance survives a topology
    /// of `n` instances iff its ordinal is at most `n`.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.num + 1
    }
}

/// A persistent volume attached to an instance.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Volume {
    /// Identifier of the volume.
    pub id: String,

    /// Size of the volume in gigabytes.
    pub size_gb: u32,
}

/// Marker trait for [`Platform`] errors.
pub trait PlatformError: Debug + Error + Send + Sync + 'static {}

/// Abstract interface for the orchestration platform: component lookup plus
/// instance lifecycle operations and their blocking waits.
///
/// Lifecycle calls are expected to be idempotent on the platform side
/// (starting a started instance is a no-op), which is what makes re-running
/// an aborted deployment the recovery path.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The error type for this platform.
    type Error: PlatformError;

    /// Load a component with its current release, target release, and
    /// instance list.
    async fn load_component(&self, app: &str, component: &str)
    -> Result<Component, Self::Error>;

    /// Request that the instance be started. Does not block on the instance
    /// actually coming up.
    async fn start_instance(&self, instance: &Instance) -> Result<(), Self::Error>;

    /// Request that the instance be stopped.
    async fn stop_instance(&self, instance: &Instance) -> Result<(), Self::Error>;

    /// Request that the instance be deleted.
    async fn delete_instance(&self, instance: &Instance) -> Result<(), Self::Error>;

    /// Block until the instance reports started.
    async fn wait_for_started(&self, instance: &Instance) -> Result<(), Self::Error>;

    /// Block until the instance reports stopped.
    async fn wait_for_stopped(&self, instance: &Instance) -> Result<(), Self::Error>;

    /// Block until the instance is gone.
    async fn wait_for_deleted(&self, instance: &Instance) -> Result<(), Self::Error>;
}
