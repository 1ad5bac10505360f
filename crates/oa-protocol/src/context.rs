use serde::{Deserialize, Serialize};

/// Point-in-time capture of the cluster CLI's active context.
///
/// Replaced wholesale whenever a fresher one is fetched; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Cluster name from the current kubeconfig context.
    #[serde(default)]
    pub cluster: String,
    /// Active namespace (or OpenShift project).
    #[serde(default)]
    pub namespace: String,
    /// Authenticated user entry.
    #[serde(default)]
    pub user: String,
    /// API server URL of the cluster.
    #[serde(default)]
    pub server: String,
}

impl ContextSnapshot {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        user: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            user: user.into(),
            server: server.into(),
        }
    }

    /// Input prompt prefix, e.g. `"[c1/demo] "`. Empty when no namespace is known.
    pub fn prompt_label(&self) -> String {
        if self.namespace.is_empty() {
            String::new()
        } else {
            format!("[{}/{}] ", self.cluster, self.namespace)
        }
    }

    /// True when nothing is known about the environment.
    pub fn is_empty(&self) -> bool {
        self.cluster.is_empty()
            && self.namespace.is_empty()
            && self.user.is_empty()
            && self.server.is_empty()
    }
}
