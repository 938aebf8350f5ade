use esroll_cluster::{ClusterAdmin, HttpClusterClient};

/// Builds the cluster-admin client for a deployment from a live instance's
/// externally reachable address. A seam so tests can substitute a scripted
/// cluster.
pub trait ClusterConnector: Send + Sync {
    /// The cluster-admin client this connector produces.
    type Admin: ClusterAdmin;

    /// Build a client bound to the given instance address.
    fn connect(&self, address: &str) -> Self::Admin;
}

/// Connects to the instance's cluster-admin HTTP endpoint directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpClusterConnector;

impl ClusterConnector for HttpClusterConnector {
    type Admin = HttpClusterClient;

    fn connect(&self, address: &str) -> HttpClusterClient {
        // Platform addresses may omit the scheme.
        if address.contains("://") {
            HttpClusterClient::new(address)
        } else {
            HttpClusterClient::new(format!("http://{address}"))
        }
    }
}
