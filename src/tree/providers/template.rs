use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::error::Result;
use crate::tree::node::TreeNode;
use crate::tree::provider::{sort_by_metadata_name, DataProvider, GITOPS_TEMPLATES};
use crate::tree::snapshot::TreeSnapshot;

/// GitOps templates, sorted by name.
///
/// All or nothing: a failed listing is returned as `QueryFailed` so the view
/// can show its error state.
pub struct TemplateDataProvider {
    query: Arc<dyn ClusterQuery>,
}

impl TemplateDataProvider {
    pub fn new(query: Arc<dyn ClusterQuery>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl DataProvider for TemplateDataProvider {
    async fn build_tree(&self) -> Result<TreeSnapshot> {
        let mut templates = self
            .query
            .list_resources(GITOPS_TEMPLATES, &QueryScope::default())
            .await?;
        sort_by_metadata_name(&mut templates);

        let mut snapshot = TreeSnapshot::new();
        for template in templates {
            let label = template.name().to_string();
            snapshot.add_root(TreeNode::for_resource(label, template).with_context(&["gitopsTemplate"]));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::kubectl::MockClusterQuery;
    use crate::error::Error;
    use crate::tree::providers::fixtures::resource;

    #[tokio::test]
    async fn templates_are_listed_by_name() {
        let mut query = MockClusterQuery::new();
        query.expect_list_resources().times(1).returning(|_, _| {
            Ok(vec![
                resource("GitOpsTemplate", "default", "eks-cluster"),
                resource("GitOpsTemplate", "default", "aks-cluster"),
            ])
        });

        let snapshot = TemplateDataProvider::new(Arc::new(query))
            .build_tree()
            .await
            .unwrap();
        let labels: Vec<_> = snapshot
            .roots()
            .iter()
            .map(|&id| snapshot.node(id).label.as_str())
            .collect();
        assert_eq!(labels, vec!["aks-cluster", "eks-cluster"]);
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let mut query = MockClusterQuery::new();
        query
            .expect_list_resources()
            .returning(|_, _| Err(Error::query_failed("no matches for kind GitOpsTemplate")));

        let err = TemplateDataProvider::new(Arc::new(query))
            .build_tree()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueryFailed(_)));
    }
}
