use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::error::Result;
use crate::tree::node::{source_ref, Icon, ResourceKind, TreeNode};
use crate::tree::provider::{
    fetch_isolated, sort_by_metadata_name, DataProvider, HELM_RELEASES, KUSTOMIZATIONS,
};
use crate::tree::snapshot::TreeSnapshot;

/// Kustomizations and HelmReleases in one view. Each workload carries a child
/// naming the source it reconciles from.
///
/// The two kinds are fetched independently; a kind that fails is skipped.
pub struct WorkloadDataProvider {
    query: Arc<dyn ClusterQuery>,
}

impl WorkloadDataProvider {
    pub fn new(query: Arc<dyn ClusterQuery>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl DataProvider for WorkloadDataProvider {
    async fn build_tree(&self) -> Result<TreeSnapshot> {
        let mut workloads = fetch_isolated(
            self.query.as_ref(),
            &[KUSTOMIZATIONS, HELM_RELEASES],
            &QueryScope::default(),
        )
        .await;
        sort_by_metadata_name(&mut workloads);

        let mut snapshot = TreeSnapshot::new();
        for workload in workloads {
            let label = format!("{}: {}", workload.kind, workload.name());
            let kind_context = workload.kind.to_ascii_lowercase();
            let suspended = workload.spec.get("suspend").and_then(|s| s.as_bool()) == Some(true);
            let source = source_ref(&workload);

            let node = TreeNode::for_resource(label, workload).with_context(&[
                "workload",
                kind_context.as_str(),
                if suspended { "suspend" } else { "" },
            ]);
            let id = snapshot.add_root(node);

            if let Some(source) = source {
                let child = TreeNode::new(
                    format!("Source: {source}"),
                    ResourceKind::Other("SourceRef".to_string()),
                )
                .with_icon(Icon::Theme("link"));
                snapshot.add_child(id, child);
            }
        }
        Ok(snapshot)
    }
}
