use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::kubeconfig::ContextSource;
use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::error::{Error, Result};
use crate::models::k8s::KubeContext;
use crate::tree::node::{container_image, ResourceKind, TreeNode};
use crate::tree::provider::{sort_by_metadata_name, DataProvider, DEPLOYMENTS};
use crate::tree::snapshot::TreeSnapshot;

/// Kubeconfig contexts, with the GitOps controllers of the current one.
///
/// Reading kubeconfig is all or nothing. Listing controllers is not: if it
/// fails the current cluster is still shown, without children.
pub struct ClusterDataProvider {
    contexts: Arc<dyn ContextSource>,
    query: Arc<dyn ClusterQuery>,
    flux_namespace: String,
}

impl ClusterDataProvider {
    pub fn new(
        contexts: Arc<dyn ContextSource>,
        query: Arc<dyn ClusterQuery>,
        flux_namespace: impl Into<String>,
    ) -> Self {
        Self {
            contexts,
            query,
            flux_namespace: flux_namespace.into(),
        }
    }

    fn cluster_node(context: &KubeContext, gitops_state: &str) -> TreeNode {
        let description = if context.cluster != context.name {
            Some(context.cluster.clone())
        } else {
            context.server_url.clone()
        };
        let node = TreeNode::new(&context.name, ResourceKind::Cluster).with_context(&[
            "cluster",
            if context.is_active { "currentCluster" } else { "" },
            gitops_state,
        ]);
        match description {
            Some(d) => node.with_description(d),
            None => node,
        }
    }
}

#[async_trait]
impl DataProvider for ClusterDataProvider {
    async fn build_tree(&self) -> Result<TreeSnapshot> {
        let source = Arc::clone(&self.contexts);
        let mut contexts = tokio::task::spawn_blocking(move || source.contexts())
            .await
            .map_err(|e| Error::query_failed(format!("kubeconfig read aborted: {e}")))?
            .map_err(|e| Error::query_failed(e.to_string()))?;
        contexts.sort_by(|a, b| a.name.cmp(&b.name));

        let mut snapshot = TreeSnapshot::new();
        for context in &contexts {
            if !context.is_active {
                snapshot.add_root(Self::cluster_node(context, ""));
                continue;
            }

            let scope = QueryScope::context(&context.name).in_namespace(&self.flux_namespace);
            match self.query.list_resources(DEPLOYMENTS, &scope).await {
                Ok(mut controllers) => {
                    sort_by_metadata_name(&mut controllers);
                    let state = if controllers.is_empty() {
                        "gitOpsDisabled"
                    } else {
                        "gitOpsEnabled"
                    };
                    let mut node = Self::cluster_node(context, state);
                    if !controllers.is_empty() {
                        node.expand();
                    }
                    let id = snapshot.add_root(node);

                    for controller in controllers {
                        let label = controller.name().to_string();
                        let version = container_image(&controller)
                            .and_then(|image| image.rsplit_once(':'))
                            .map(|(_, tag)| tag.to_string());
                        let mut child = TreeNode::for_resource(label, controller)
                            .with_context(&["gitOpsController"]);
                        if let Some(version) = version {
                            child = child.with_description(version);
                        }
                        snapshot.add_child(id, child);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "tree: cannot list controllers on {}: {e}",
                        context.name
                    );
                    snapshot.add_root(Self::cluster_node(context, "gitOpsUnknown"));
                }
            }
        }
        Ok(snapshot)
    }
}
