use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::kubectl::{ClusterQuery, QueryScope};
use crate::error::Result;
use crate::tree::node::TreeNode;
use crate::tree::provider::{
    fetch_isolated, sort_by_metadata_name, DataProvider, BUCKETS, GIT_REPOSITORIES,
    HELM_REPOSITORIES, OCI_REPOSITORIES,
};
use crate::tree::snapshot::TreeSnapshot;

const SOURCE_KINDS: [&str; 4] = [GIT_REPOSITORIES, OCI_REPOSITORIES, HELM_REPOSITORIES, BUCKETS];

/// Flux sources of every kind, merged into one flat list sorted by name.
///
/// Each kind is fetched independently; a kind that fails is skipped.
pub struct SourceDataProvider {
    query: Arc<dyn ClusterQuery>,
}

impl SourceDataProvider {
    pub fn new(query: Arc<dyn ClusterQuery>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl DataProvider for SourceDataProvider {
    async fn build_tree(&self) -> Result<TreeSnapshot> {
        let mut sources =
            fetch_isolated(self.query.as_ref(), &SOURCE_KINDS, &QueryScope::default()).await;
        sort_by_metadata_name(&mut sources);

        let mut snapshot = TreeSnapshot::new();
        for source in sources {
            let label = format!("{}: {}", source.kind, source.name());
            let description = source.namespace().unwrap_or_default().to_string();
            let suspended = source.spec.get("suspend").and_then(|s| s.as_bool()) == Some(true);
            let node = TreeNode::for_resource(label, source)
                .with_description(description)
                .with_context(&["source", if suspended { "suspend" } else { "" }]);
            snapshot.add_root(node);
        }
        Ok(snapshot)
    }
}
