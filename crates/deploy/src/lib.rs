//! The rolling-deployment state machine: moves a search-engine component
//! from its current release to its target release one instance at a time,
//! keeping the cluster writable throughout.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod connect;
mod error;

pub use connect::{ClusterConnector, HttpClusterConnector};
pub use error::Error;

use std::time::Duration;

use futures::future::try_join_all;
use tokio::time::sleep;
use tracing::{debug, error, info};

use esroll_cluster::{ClusterAdmin, wait_for_shard_recovery};
use esroll_platform::{Component, Instance, Platform, Release};

/// How long a freshly started instance gets to join the cluster before
/// shard allocation is re-enabled.
const SETTLE_AFTER_START: Duration = Duration::from_secs(30);

/// Drives deployments of a component against an orchestration platform and
/// the cluster-admin API of the component's own instances.
///
/// A deployment either runs to completion or aborts at the first failing
/// step; re-running with the same target resumes where it left off, since
/// instances already on the target release are skipped.
#[derive(Debug)]
pub struct Deployer<P, C> {
    platform: P,
    connector: C,
}

impl<P, C> Deployer<P, C>
where
    P: Platform,
    C: ClusterConnector,
{
    /// Create a deployer over the given platform and cluster connector.
    pub const fn new(platform: P, connector: C) -> Self {
        Self {
            platform,
            connector,
        }
    }

    /// Deploy the component to its target release.
    ///
    /// A component that has never run gets all its instances started
    /// concurrently; a component with a current release is rolled one
    /// instance at a time.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing step. The cluster may be left
    /// mid-transition; re-running with the same target resumes the rollout.
    pub async fn deploy(&self, app: &str, component: &str) -> Result<(), Error> {
        let loaded = self
            .platform
            .load_component(app, component)
            .await
            .map_err(Error::platform)?;

        info!(
            component = %loaded.id,
            target_release = %loaded.target_release.id,
            "starting deployment",
        );

        match loaded.current_release {
            None => self.first_deploy(&loaded).await,
            Some(_) => self.rolling_update(app, component, &loaded).await,
        }
    }

    /// First deployment: no data to protect, so every instance that is not
    /// yet running starts concurrently.
    async fn first_deploy(&self, component: &Component) -> Result<(), Error> {
        let pending: Vec<&Instance> = component
            .instances
            .iter()
            .filter(|instance| !instance.started)
            .collect();

        if pending.is_empty() {
            info!("all instances already started, nothing to do");
            return Ok(());
        }

        info!(count = pending.len(), "starting instances concurrently");

        try_join_all(
            pending
                .iter()
                .map(|instance| self.platform.start_instance(instance)),
        )
        .await
        .map_err(Error::platform)?;

        try_join_all(
            pending
                .iter()
                .map(|instance| self.platform.wait_for_started(instance)),
        )
        .await
        .map_err(Error::platform)?;

        Ok(())
    }

    /// Rolling update from the current release to the target release.
    async fn rolling_update(
        &self,
        app: &str,
        name: &str,
        component: &Component,
    ) -> Result<(), Error> {
        let current_count = component
            .current_release
            .as_ref()
            .map_or(0, |release| release.instance_count);
        let target_count = component.target_release.instance_count;

        // During a rollout the platform holds every surviving instance plus
        // any doomed instances an aborted scale-down has not yet deleted;
        // absent doomed ordinals are treated as already removed. Anything
        // outside that range means the component is mid-mutation elsewhere.
        let min = target_count as usize;
        let max = current_count.max(target_count) as usize;
        let actual = component.instances.len();
        if actual < min || actual > max {
            return Err(Error::InconsistentTopology { min, max, actual });
        }

        let address = component
            .instances
            .iter()
            .find(|instance| instance.started)
            .map(|instance| instance.external_address.as_str())
            .ok_or(Error::NoReachableInstance)?;
        let cluster = self.connector.connect(address);

        wait_for_shard_recovery(&cluster).await?;

        // Quorum for the target topology. Set up front and never reverted,
        // so a crashed rollout cannot leave the shrunk cluster
        // split-brain-prone.
        let quorum = target_count / 2 + 1;
        cluster
            .set_min_master_nodes(quorum)
            .await
            .map_err(Error::cluster)?;

        let draining = target_count < current_count;
        if draining {
            // Tag the doomed tail so the allocator drains shards off it
            // before any instance is deleted.
            let attrs: Vec<String> = component
                .instances
                .iter()
                .filter(|instance| instance.ordinal() > target_count)
                .map(|instance| format!("n{}", instance.ordinal()))
                .collect();

            info!(?attrs, "draining shards off instances leaving the topology");
            cluster
                .set_awareness_attrs(&attrs)
                .await
                .map_err(Error::cluster)?;
        }

        let rolled = self
            .guarded_rollout(&cluster, component, current_count, target_count, draining)
            .await;

        if draining {
            let cleared = cluster
                .clear_awareness_attrs()
                .await
                .map_err(Error::cluster);
            finish(rolled, cleared)?;
        } else {
            rolled?;
        }

        self.verify(app, name, target_count).await
    }

    /// The rebalancing-guarded middle of a rolling update: rebalancing off,
    /// instances rolled in order, rebalancing back on even when the roll
    /// fails.
    async fn guarded_rollout(
        &self,
        cluster: &C::Admin,
        component: &Component,
        current_count: u32,
        target_count: u32,
        draining: bool,
    ) -> Result<(), Error> {
        if draining {
            wait_for_shard_recovery(cluster).await?;
        }

        cluster
            .disable_shard_rebalancing()
            .await
            .map_err(Error::cluster)?;

        let rolled = self
            .roll_instances(cluster, component, current_count, target_count)
            .await;

        let enabled = cluster
            .enable_shard_rebalancing()
            .await
            .map_err(Error::cluster);
        finish(rolled, enabled)?;

        if target_count > current_count {
            self.start_new_tail(component, current_count).await?;
        }

        Ok(())
    }

    /// Roll every instance of the current topology, in ascending ordinal
    /// order.
    async fn roll_instances(
        &self,
        cluster: &C::Admin,
        component: &Component,
        current_count: u32,
        target_count: u32,
    ) -> Result<(), Error> {
        let mut instances: Vec<&Instance> = component
            .instances
            .iter()
            .filter(|instance| instance.num < current_count)
            .collect();
        instances.sort_by_key(|instance| instance.num);

        for instance in instances {
            if instance.ordinal() > target_count {
                self.remove_instance(cluster, instance).await?;
            } else {
                self.roll_instance(cluster, instance, &component.target_release)
                    .await?;
            }
        }

        Ok(())
    }

    /// Restart one instance onto the target release, or start it if it is
    /// down. Instances already running the target release are left alone.
    async fn roll_instance(
        &self,
        cluster: &C::Admin,
        instance: &Instance,
        target: &Release,
    ) -> Result<(), Error> {
        let restarting = instance.started && instance.release_id != target.id;

        if restarting {
            info!(instance = %instance.id, num = instance.num, "restarting instance");

            cluster
                .disable_shard_allocation()
                .await
                .map_err(Error::cluster)?;
            cluster.flush_translog().await.map_err(Error::cluster)?;

            self.platform
                .stop_instance(instance)
                .await
                .map_err(Error::platform)?;
            self.platform
                .wait_for_stopped(instance)
                .await
                .map_err(Error::platform)?;
        }

        if restarting || !instance.started {
            if !restarting {
                info!(instance = %instance.id, num = instance.num, "starting stopped instance");
            }

            self.platform
                .start_instance(instance)
                .await
                .map_err(Error::platform)?;
            self.platform
                .wait_for_started(instance)
                .await
                .map_err(Error::platform)?;

            // Let the node rejoin the cluster before shards get assigned
            // to it.
            sleep(SETTLE_AFTER_START).await;

            cluster
                .enable_shard_allocation()
                .await
                .map_err(Error::cluster)?;
            wait_for_shard_recovery(cluster).await?;
        } else {
            debug!(
                instance = %instance.id,
                num = instance.num,
                "instance already on target release, skipping",
            );
        }

        Ok(())
    }

    /// Delete an instance leaving the topology and wait for the cluster to
    /// re-stabilize without it. Its shards were drained earlier by the
    /// awareness tags.
    async fn remove_instance(
        &self,
        cluster: &C::Admin,
        instance: &Instance,
    ) -> Result<(), Error> {
        info!(instance = %instance.id, num = instance.num, "removing instance");

        self.platform
            .delete_instance(instance)
            .await
            .map_err(Error::platform)?;
        self.platform
            .wait_for_deleted(instance)
            .await
            .map_err(Error::platform)?;

        wait_for_shard_recovery(cluster).await?;

        Ok(())
    }

    /// Scale-up tail: instances beyond the current topology carry no data
    /// yet, so they start concurrently like a first deployment.
    async fn start_new_tail(
        &self,
        component: &Component,
        current_count: u32,
    ) -> Result<(), Error> {
        let pending: Vec<&Instance> = component
            .instances
            .iter()
            .filter(|instance| instance.num >= current_count && !instance.started)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        info!(count = pending.len(), "starting new instances concurrently");

        try_join_all(
            pending
                .iter()
                .map(|instance| self.platform.start_instance(instance)),
        )
        .await
        .map_err(Error::platform)?;

        try_join_all(
            pending
                .iter()
                .map(|instance| self.platform.wait_for_started(instance)),
        )
        .await
        .map_err(Error::platform)?;

        Ok(())
    }

    /// Reload the component and confirm every instance of the target
    /// topology is started on the target release.
    async fn verify(&self, app: &str, name: &str, target_count: u32) -> Result<(), Error> {
        let reloaded = self
            .platform
            .load_component(app, name)
            .await
            .map_err(Error::platform)?;

        for instance in &reloaded.instances {
            if instance.ordinal() > target_count {
                continue;
            }
            if !instance.started || instance.release_id != reloaded.target_release.id {
                return Err(Error::Incomplete {
                    instance: instance.id.clone(),
                });
            }
        }

        info!(
            component = %reloaded.id,
            release = %reloaded.target_release.id,
            "deployment complete",
        );

        Ok(())
    }
}

/// Join a phase's result with its compensating action's result. The
/// compensator always ran; its error only surfaces when the phase itself
/// succeeded, otherwise the phase error wins and the cleanup failure is
/// logged.
fn finish(body: Result<(), Error>, cleanup: Result<(), Error>) -> Result<(), Error> {
    match body {
        Ok(()) => cleanup,
        Err(err) => {
            if let Err(cleanup_err) = cleanup {
                error!(error = %cleanup_err, "cleanup failed after aborted rollout phase");
            }
            Err(err)
        }
    }
}
