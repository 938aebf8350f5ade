//! HTTP client for the orchestration platform's management API.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use esroll_platform::{Component, Instance, Platform};
use esroll_wait::{Check, Status, wait_for};

/// How long a lifecycle wait polls before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Interval between lifecycle-wait polls.
const WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Connection options for the platform management API.
#[derive(Clone, Debug)]
pub struct PlatformClientOptions {
    /// Base URL of the management API.
    pub endpoint: Url,

    /// Bearer token presented on every request.
    pub token: String,

    /// PEM-encoded CA certificate to trust, for platforms serving their API
    /// behind a private CA.
    pub ca_certificate: Option<PathBuf>,
}

/// A [`Platform`] backed by the management API over HTTPS.
#[derive(Clone, Debug)]
pub struct HttpPlatform {
    endpoint: String,
    token: String,
    client: Client,
}

impl HttpPlatform {
    /// Build a client from the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA certificate cannot be read or parsed, or
    /// the underlying HTTP client cannot be constructed.
    pub fn new(options: PlatformClientOptions) -> Result<Self, Error> {
        let mut builder = Client::builder();

        if let Some(path) = &options.ca_certificate {
            let pem = std::fs::read(path).map_err(|source| Error::Certificate {
                path: path.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            endpoint: options.endpoint.as_str().trim_end_matches('/').to_string(),
            token: options.token,
            client: builder.build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn post_empty(&self, path: &str) -> Result<(), Error> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_empty(&self, path: &str) -> Result<(), Error> {
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Fetch one instance; `None` means the platform no longer knows it.
    async fn fetch_instance(&self, id: &str) -> Result<Option<Instance>, Error> {
        let path = format!("instances/{id}");
        let response = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::UnexpectedStatus { status, path });
        }
        Ok(Some(response.json().await?))
    }

    async fn wait_for_state(
        &self,
        instance: &Instance,
        state: &'static str,
        want_started: Option<bool>,
    ) -> Result<(), Error> {
        let mut check = InstanceState {
            platform: self,
            id: &instance.id,
            want_started,
        };

        wait_for(WAIT_TIMEOUT, WAIT_INTERVAL, &mut check)
            .await
            .map_err(|err| match err {
                esroll_wait::Error::Check(err) => err,
                esroll_wait::Error::Timeout(_) => Error::WaitTimeout {
                    instance: instance.id.clone(),
                    state,
                },
            })
    }
}

/// Polls one instance until it reaches the wanted lifecycle state.
/// `want_started` of `None` waits for the instance to disappear.
struct InstanceState<'a> {
    platform: &'a HttpPlatform,
    id: &'a str,
    want_started: Option<bool>,
}

#[async_trait]
impl Check for InstanceState<'_> {
    type Error = Error;

    async fn poll(&mut self, _elapsed: Duration) -> Result<Status, Error> {
        let instance = self.platform.fetch_instance(self.id).await?;

        let ready = match (self.want_started, instance) {
            (None, fetched) => fetched.is_none(),
            (Some(want), Some(fetched)) => fetched.started == want,
            (Some(_), None) => false,
        };

        Ok(if ready { Status::Ready } else { Status::Pending })
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    type Error = Error;

    async fn load_component(&self, app: &str, component: &str) -> Result<Component, Error> {
        self.get_json(&format!("apps/{app}/components/{component}"))
            .await
    }

    async fn start_instance(&self, instance: &Instance) -> Result<(), Error> {
        debug!(instance = %instance.id, "requesting instance start");
        self.post_empty(&format!("instances/{}/start", instance.id))
            .await
    }

    async fn stop_instance(&self, instance: &Instance) -> Result<(), Error> {
        debug!(instance = %instance.id, "requesting instance stop");
        self.post_empty(&format!("instances/{}/stop", instance.id))
            .await
    }

    async fn delete_instance(&self, instance: &Instance) -> Result<(), Error> {
        debug!(instance = %instance.id, "requesting instance deletion");
        self.delete_empty(&format!("instances/{}", instance.id))
            .await
    }

    async fn wait_for_started(&self, instance: &Instance) -> Result<(), Error> {
        self.wait_for_state(instance, "started", Some(true)).await
    }

    async fn wait_for_stopped(&self, instance: &Instance) -> Result<(), Error> {
        self.wait_for_state(instance, "stopped", Some(false)).await
    }

    async fn wait_for_deleted(&self, instance: &Instance) -> Result<(), Error> {
        self.wait_for_state(instance, "deleted", None).await
    }
}
