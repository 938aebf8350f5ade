//! CLI binary driving safe rolling deployments of a search-engine
//! component.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use url::Url;

use esroll_deploy::{Deployer, HttpClusterConnector};
use esroll_platform_http::{HttpPlatform, PlatformClientOptions};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
enum Error {
    /// Deployment error
    #[error(transparent)]
    Deploy(#[from] esroll_deploy::Error),

    /// Platform client error
    #[error(transparent)]
    Platform(#[from] esroll_platform_http::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the orchestration platform's management API
    #[arg(long, env = "ESROLL_API_URL")]
    api_url: Url,

    /// Bearer token for the management API
    #[arg(long, env = "ESROLL_API_TOKEN")]
    api_token: String,

    /// PEM-encoded CA certificate for the management API
    #[arg(long, env = "ESROLL_API_CERT")]
    api_cert: Option<PathBuf>,

    /// Application the component belongs to
    #[arg(long, env = "ESROLL_APP")]
    app: String,

    /// Component to deploy
    #[arg(long, env = "ESROLL_COMPONENT")]
    component: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let platform = HttpPlatform::new(PlatformClientOptions {
        endpoint: args.api_url,
        token: args.api_token,
        ca_certificate: args.api_cert,
    })?;

    let deployer = Deployer::new(platform, HttpClusterConnector);

    if let Err(err) = deployer.deploy(&args.app, &args.component).await {
        error!(error = %err, "deployment failed");
        return Err(err.into());
    }

    Ok(())
}
