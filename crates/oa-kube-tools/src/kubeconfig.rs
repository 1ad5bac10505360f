//! Parsing of `config view -o json` output.

use oa_protocol::ContextSnapshot;
use serde::Deserialize;

use crate::error::{CliError, CliResult};

#[derive(Debug, Deserialize)]
struct KubeConfigView {
    #[serde(rename = "current-context", default)]
    current_context: String,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    #[serde(default)]
    context: ContextFields,
}

#[derive(Debug, Default, Deserialize)]
struct ContextFields {
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    #[serde(default)]
    cluster: ClusterFields,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterFields {
    #[serde(default)]
    server: String,
}

/// Extract the active context from a kubeconfig JSON document.
///
/// A `current-context` naming no entry yields an empty snapshot rather than
/// an error, matching what the CLI itself reports in that state.
pub fn parse_current_context(json: &str) -> CliResult<ContextSnapshot> {
    let view: KubeConfigView = serde_json::from_str(json)
        .map_err(|e| CliError::Context(format!("failed to parse config: {e}")))?;

    let Some(current) = view
        .contexts
        .iter()
        .find(|c| c.name == view.current_context)
    else {
        return Ok(ContextSnapshot::default());
    };

    let server = view
        .clusters
        .iter()
        .find(|c| c.name == current.context.cluster)
        .map(|c| c.cluster.server.clone())
        .unwrap_or_default();

    Ok(ContextSnapshot {
        cluster: current.context.cluster.clone(),
        namespace: current.context.namespace.clone(),
        user: current.context.user.clone(),
        server,
    })
}
