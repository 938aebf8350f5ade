//! Shard-recovery stabilization wait.
//!
//! Cluster health flaps while shards move, so a single good reading means
//! nothing. This wait demands an unbroken streak of readings on one branch
//! before declaring the cluster settled, with a longer streak required the
//! worse the branch: 5 consecutive green/yellow ticks, 20 consecutive red
//! ticks (a stable-but-degraded cluster is a valid stopping point for
//! *waiting*; proceeding is the caller's call), or 20 consecutive
//! uncertain/unreachable ticks once the startup grace window has passed.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use esroll_wait::{Check, Status, wait_for};

use crate::{ClusterAdmin, HealthStatus};

const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Probe failures inside this window abort the wait; after it they are
/// treated as an uncertain-but-settled cluster.
const ERROR_GRACE_PERIOD: Duration = Duration::from_secs(2 * 60);

const STABLE_TICKS: u32 = 5;
const RED_TICKS: u32 = 20;
const UNCERTAIN_TICKS: u32 = 20;

/// Errors from [`wait_for_shard_recovery`].
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The cluster-admin API kept failing during the startup grace window.
    #[error("cluster health unreachable while waiting on shard recovery")]
    Unreachable,

    /// The overall deadline elapsed without health stabilizing.
    #[error("timed out waiting on shard recovery")]
    DeadlineElapsed,
}

/// Consecutive-tick counters for one wait invocation. Taking one branch
/// resets the other two; a tick showing in-flight shard movement touches
/// none of them.
///
/// Only an uncertain streak that contained at least one probe failure can
/// abort the wait inside the grace window; a streak of merely unrecognized
/// health statuses keeps polling until the window passes and then settles.
struct RecoveryCheck<'a, C> {
    cluster: &'a C,
    stable: u32,
    red: u32,
    uncertain: u32,
    probe_failed_in_streak: bool,
}

#[async_trait]
impl<C: ClusterAdmin> Check for RecoveryCheck<'_, C> {
    type Error = RecoveryError;

    async fn poll(&mut self, elapsed: Duration) -> Result<Status, RecoveryError> {
        let health = match self.cluster.health().await {
            Ok(health) => Some(health),
            Err(err) => {
                warn!(error = %err, "health probe failed while waiting on shard recovery");
                None
            }
        };

        let probe_failed = health.is_none();

        match health {
            // An in-flight shard move is transient noise: it neither ends a
            // stabilization streak nor extends one.
            Some(health) if health.shards_moving() => Ok(Status::Pending),
            Some(health) if matches!(health.status, HealthStatus::Green | HealthStatus::Yellow) => {
                self.red = 0;
                self.uncertain = 0;
                self.probe_failed_in_streak = false;
                self.stable += 1;
                Ok(ready_if(self.stable >= STABLE_TICKS))
            }
            Some(health) if health.status == HealthStatus::Red => {
                self.stable = 0;
                self.uncertain = 0;
                self.probe_failed_in_streak = false;
                self.red += 1;
                if self.red >= RED_TICKS {
                    warn!("cluster is stable but red; treating shard recovery as settled");
                    return Ok(Status::Ready);
                }
                Ok(Status::Pending)
            }
            // Probe failure or a status we do not recognize.
            _ => {
                self.stable = 0;
                self.red = 0;
                self.uncertain += 1;
                self.probe_failed_in_streak |= probe_failed;
                if self.uncertain >= UNCERTAIN_TICKS {
                    if elapsed <= ERROR_GRACE_PERIOD {
                        if self.probe_failed_in_streak {
                            return Err(RecoveryError::Unreachable);
                        }
                        return Ok(Status::Pending);
                    }
                    warn!("cluster health stayed uncertain past the grace window; proceeding");
                    return Ok(Status::Ready);
                }
                Ok(Status::Pending)
            }
        }
    }
}

const fn ready_if(done: bool) -> Status {
    if done { Status::Ready } else { Status::Pending }
}

/// Blocks until cluster health stabilizes per the hysteresis rules above,
/// polling every 5 seconds for up to 30 minutes.
///
/// # Errors
///
/// Returns an error if health probes keep failing inside the grace window
/// or the deadline elapses without stabilization.
pub async fn wait_for_shard_recovery<C: ClusterAdmin>(cluster: &C) -> Result<(), RecoveryError> {
    let mut check = RecoveryCheck {
        cluster,
        stable: 0,
        red: 0,
        uncertain: 0,
        probe_failed_in_streak: false,
    };

    wait_for(RECOVERY_TIMEOUT, POLL_INTERVAL, &mut check)
        .await
        .map_err(|err| match err {
            esroll_wait::Error::Check(err) => err,
            esroll_wait::Error::Timeout(_) => RecoveryError::DeadlineElapsed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::{ClusterAdminError, ClusterHealth};

    #[derive(Debug, Error)]
    #[error("scripted probe failure")]
    struct ScriptedError;

    impl ClusterAdminError for ScriptedError {}

    enum Tick {
        Health(ClusterHealth),
        Failure,
    }

    struct ScriptedCluster {
        ticks: Mutex<VecDeque<Tick>>,
        fallback: Tick,
        probes: AtomicU32,
    }

    impl ScriptedCluster {
        fn new(ticks: Vec<Tick>, fallback: Tick) -> Self {
            Self {
                ticks: Mutex::new(ticks.into()),
                fallback,
                probes: AtomicU32::new(0),
            }
        }

        fn probes(&self) -> u32 {
            self.probes.load(Ordering::SeqCst)
        }
    }

    fn health(status: HealthStatus) -> ClusterHealth {
        ClusterHealth {
            status,
            number_of_data_nodes: 3,
            initializing_shards: 0,
            relocating_shards: 0,
        }
    }

    fn relocating() -> ClusterHealth {
        ClusterHealth {
            relocating_shards: 1,
            ..health(HealthStatus::Green)
        }
    }

    #[async_trait]
    impl ClusterAdmin for ScriptedCluster {
        type Error = ScriptedError;

        async fn health(&self) -> Result<ClusterHealth, ScriptedError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let tick = self.ticks.lock().unwrap().pop_front();
            match tick.as_ref().unwrap_or(&self.fallback) {
                Tick::Health(health) => Ok(health.clone()),
                Tick::Failure => Err(ScriptedError),
            }
        }

        async fn set_min_master_nodes(&self, _min: u32) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn set_awareness_attrs(&self, _attrs: &[String]) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn clear_awareness_attrs(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn disable_shard_rebalancing(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn enable_shard_rebalancing(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn disable_shard_allocation(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn enable_shard_allocation(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }

        async fn flush_translog(&self) -> Result<(), ScriptedError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn green_streak_survives_a_shard_moving_tick() {
        // Four greens, one tick with a relocating shard, then more greens.
        // The moving tick must neither reset the streak (which would demand
        // five further greens) nor advance it (which would declare at the
        // fifth tick), so stabilization lands exactly on the sixth probe.
        let cluster = ScriptedCluster::new(
            vec![
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(relocating()),
            ],
            Tick::Health(health(HealthStatus::Green)),
        );

        wait_for_shard_recovery(&cluster).await.unwrap();

        assert_eq!(cluster.probes(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn yellow_counts_toward_the_stable_streak() {
        let cluster = ScriptedCluster::new(
            vec![
                Tick::Health(health(HealthStatus::Yellow)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Yellow)),
            ],
            Tick::Health(health(HealthStatus::Yellow)),
        );

        wait_for_shard_recovery(&cluster).await.unwrap();

        assert_eq!(cluster.probes(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn red_tick_resets_the_stable_streak() {
        let cluster = ScriptedCluster::new(
            vec![
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Green)),
                Tick::Health(health(HealthStatus::Red)),
            ],
            Tick::Health(health(HealthStatus::Green)),
        );

        wait_for_shard_recovery(&cluster).await.unwrap();

        // Three greens, the red reset, then a fresh streak of five.
        assert_eq!(cluster.probes(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn stable_red_settles_after_twenty_ticks() {
        let cluster = ScriptedCluster::new(vec![], Tick::Health(health(HealthStatus::Red)));

        wait_for_shard_recovery(&cluster).await.unwrap();

        assert_eq!(cluster.probes(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_probe_failures_inside_grace_window_are_fatal() {
        // Twenty consecutive failures complete at 95s of elapsed time, well
        // inside the two-minute grace window.
        let cluster = ScriptedCluster::new(vec![], Tick::Failure);

        let err = wait_for_shard_recovery(&cluster).await.unwrap_err();

        assert!(matches!(err, RecoveryError::Unreachable));
        assert_eq!(cluster.probes(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_statuses_inside_grace_window_are_not_fatal() {
        // An endless run of statuses we do not recognize counts as
        // uncertain, but with every probe answering it must never abort the
        // wait; it keeps polling through the grace window and settles on
        // the first uncertain tick past it (tick 26 lands at 125s).
        let cluster = ScriptedCluster::new(vec![], Tick::Health(health(HealthStatus::Other)));

        wait_for_shard_recovery(&cluster).await.unwrap();

        assert_eq!(cluster.probes(), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failures_past_grace_window_settle() {
        // Eight moving ticks push the twentieth consecutive failure past the
        // two-minute grace window (tick 28 lands at 135s), after which the
        // wait declares stabilization instead of failing.
        let mut ticks = Vec::new();
        for _ in 0..8 {
            ticks.push(Tick::Health(relocating()));
        }
        let cluster = ScriptedCluster::new(ticks, Tick::Failure);

        wait_for_shard_recovery(&cluster).await.unwrap();

        assert_eq!(cluster.probes(), 28);
    }

    #[tokio::test(start_paused = true)]
    async fn endless_shard_movement_hits_the_deadline() {
        let cluster = ScriptedCluster::new(vec![], Tick::Health(relocating()));

        let err = wait_for_shard_recovery(&cluster).await.unwrap_err();

        assert!(matches!(err, RecoveryError::DeadlineElapsed));
    }
}
