use async_trait::async_trait;
use futures::future::join_all;
#[cfg(test)]
use mockall::automock;

use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::error::Result;
use crate::models::k8s::KubeResource;
use crate::tree::snapshot::TreeSnapshot;

pub const GIT_REPOSITORIES: &str = "gitrepositories.source.toolkit.fluxcd.io";
pub const OCI_REPOSITORIES: &str = "ocirepositories.source.toolkit.fluxcd.io";
pub const HELM_REPOSITORIES: &str = "helmrepositories.source.toolkit.fluxcd.io";
pub const BUCKETS: &str = "buckets.source.toolkit.fluxcd.io";
pub const KUSTOMIZATIONS: &str = "kustomizations.kustomize.toolkit.fluxcd.io";
pub const HELM_RELEASES: &str = "helmreleases.helm.toolkit.fluxcd.io";
pub const GITOPS_TEMPLATES: &str = "gitopstemplates.templates.weave.works";
pub const DEPLOYMENTS: &str = "deployments";
pub const NODES: &str = "nodes";
pub const NAMESPACES: &str = "namespaces";

/// Builds the whole tree of one view.
///
/// Each call returns a fresh snapshot with every descendant materialized;
/// snapshots returned earlier are never touched again.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn build_tree(&self) -> Result<TreeSnapshot>;
}

/// Sorts by `metadata.name`, byte-wise. The sort is stable, so equal names
/// keep their fetch order.
pub fn sort_by_metadata_name(resources: &mut [KubeResource]) {
    resources.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Lists several kinds concurrently. A kind that fails is logged and left out;
/// it never hides the kinds that succeeded. Results keep the order of `kinds`.
pub async fn fetch_isolated(
    query: &dyn ClusterQuery,
    kinds: &[&str],
    scope: &QueryScope,
) -> Vec<KubeResource> {
    let fetches = kinds.iter().map(|kind| async move {
        match query.list_resources(kind, scope).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("tree: skipping {kind}: {e}");
                Vec::new()
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}
