//! Cluster provider detection
//!
//! Classifies a cluster by probing its nodes and namespaces. Detection never
//! fails: anything inconclusive is `ProviderKind::Unknown`, and nothing is
//! cached between calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::models::cluster::{ClusterDescriptor, ProviderKind};
use crate::models::k8s::KubeResource;
use crate::tree::provider::{NAMESPACES, NODES};

/// Label AKS puts on every node
const AKS_NODE_LABEL: &str = "kubernetes.azure.com/cluster";
const AZURE_PROVIDER_ID_PREFIX: &str = "azure://";
/// Namespace the Azure ARC agents run in
const ARC_NAMESPACE: &str = "azure-arc";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderDetector: Send + Sync {
    async fn detect(&self, cluster: &ClusterDescriptor) -> ProviderKind;
}

pub struct ClusterProviderDetector {
    query: Arc<dyn ClusterQuery>,
    overrides: HashMap<String, ProviderKind>,
}

impl ClusterProviderDetector {
    pub fn new(query: Arc<dyn ClusterQuery>, overrides: HashMap<String, ProviderKind>) -> Self {
        Self { query, overrides }
    }
}

fn is_aks_node(node: &KubeResource) -> bool {
    node.metadata.labels.contains_key(AKS_NODE_LABEL)
        || node
            .spec
            .get("providerID")
            .and_then(|id| id.as_str())
            .is_some_and(|id| id.starts_with(AZURE_PROVIDER_ID_PREFIX))
}

#[async_trait]
impl ProviderDetector for ClusterProviderDetector {
    async fn detect(&self, cluster: &ClusterDescriptor) -> ProviderKind {
        if let Some(kind) = self.overrides.get(&cluster.context) {
            log::debug!("detector: {} configured as {kind}", cluster.context);
            return *kind;
        }

        let scope = QueryScope::context(&cluster.context);

        let nodes = match self.query.list_resources(NODES, &scope).await {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("detector: cannot list nodes of {}: {e}", cluster.context);
                return ProviderKind::Unknown;
            }
        };
        if nodes.is_empty() {
            log::warn!("detector: {} reports no nodes", cluster.context);
            return ProviderKind::Unknown;
        }
        if nodes.iter().any(is_aks_node) {
            return ProviderKind::Aks;
        }

        let provider = match self.query.list_resources(NAMESPACES, &scope).await {
            Ok(namespaces) if namespaces.iter().any(|ns| ns.name() == ARC_NAMESPACE) => {
                ProviderKind::AzureArc
            }
            Ok(_) => ProviderKind::Generic,
            Err(e) => {
                log::warn!("detector: cannot list namespaces of {}: {e}", cluster.context);
                ProviderKind::Unknown
            }
        };
        log::debug!("detector: {} detected as {provider}", cluster.context);
        provider
    }
}
