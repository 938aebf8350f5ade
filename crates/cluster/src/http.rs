//! Reqwest-backed implementation of [`ClusterAdmin`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::{
    ClusterAdmin, ClusterHealth, ClusterSettings, DEFAULT_CONCURRENT_REBALANCE,
    SETTING_ALLOCATION_ENABLE, SETTING_AWARENESS_ATTRIBUTES, SETTING_CONCURRENT_REBALANCE,
    SETTING_MIN_MASTER_NODES,
};

/// A [`ClusterAdmin`] talking to one node's cluster-admin HTTP endpoint.
#[derive(Clone, Debug)]
pub struct HttpClusterClient {
    base_url: String,
    client: Client,
}

impl HttpClusterClient {
    /// Create a client bound to the given base URL, e.g.
    /// `http://10.0.0.4:9200`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn put_json(&self, path: &str, body: &impl Serialize) -> Result<(), Error> {
        let response = self.client.put(self.url(path)).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn post_empty(&self, path: &str) -> Result<(), Error> {
        let response = self.client.post(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn patch_cluster_settings(&self, settings: &ClusterSettings) -> Result<(), Error> {
        self.put_json("_cluster/settings", settings).await
    }
}

#[async_trait]
impl ClusterAdmin for HttpClusterClient {
    type Error = Error;

    async fn health(&self) -> Result<ClusterHealth, Error> {
        self.get_json("_cluster/health").await
    }

    async fn set_min_master_nodes(&self, min: u32) -> Result<(), Error> {
        debug!(min, "setting minimum master nodes");
        self.put_json("_settings", &json!({ SETTING_MIN_MASTER_NODES: min }))
            .await
    }

    async fn set_awareness_attrs(&self, attrs: &[String]) -> Result<(), Error> {
        debug!(?attrs, "setting shard-awareness attributes");
        self.patch_cluster_settings(&ClusterSettings::persistent(
            SETTING_AWARENESS_ATTRIBUTES,
            attrs.join(","),
        ))
        .await
    }

    async fn clear_awareness_attrs(&self) -> Result<(), Error> {
        debug!("clearing shard-awareness attributes");
        self.patch_cluster_settings(&ClusterSettings::persistent(SETTING_AWARENESS_ATTRIBUTES, ""))
            .await
    }

    async fn disable_shard_rebalancing(&self) -> Result<(), Error> {
        debug!("disabling shard rebalancing");
        self.patch_cluster_settings(&ClusterSettings::persistent(SETTING_CONCURRENT_REBALANCE, 0))
            .await
    }

    async fn enable_shard_rebalancing(&self) -> Result<(), Error> {
        debug!("enabling shard rebalancing");
        self.patch_cluster_settings(&ClusterSettings::persistent(
            SETTING_CONCURRENT_REBALANCE,
            DEFAULT_CONCURRENT_REBALANCE,
        ))
        .await
    }

    async fn disable_shard_allocation(&self) -> Result<(), Error> {
        debug!("restricting shard allocation to new primaries");
        self.patch_cluster_settings(&ClusterSettings::persistent(
            SETTING_ALLOCATION_ENABLE,
            "new_primaries",
        ))
        .await
    }

    async fn enable_shard_allocation(&self) -> Result<(), Error> {
        debug!("allowing all shard allocation");
        self.patch_cluster_settings(&ClusterSettings::persistent(SETTING_ALLOCATION_ENABLE, "all"))
            .await
    }

    async fn flush_translog(&self) -> Result<(), Error> {
        debug!("issuing synced translog flush");
        self.post_empty("_flush/synced").await
    }
}
