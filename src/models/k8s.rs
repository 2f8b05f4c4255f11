// Rust structs mirroring the JSON `kubectl get -o json` prints
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_active: bool,
    /// API server URL of the context's cluster
    pub server_url: Option<String>,
    /// Absolute path of the kubeconfig file that contains this context
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// One object as returned by the cluster. Only the fields the tree needs are
/// typed; `spec` and `status` stay opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeResource {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
}

impl KubeResource {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Looks up `status.conditions[type == condition_type]`.
    pub fn condition(&self, condition_type: &str) -> Option<&serde_json::Value> {
        self.status
            .get("conditions")?
            .as_array()?
            .iter()
            .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(condition_type))
    }

    /// `kind/namespace/name`, the identity a tree node keeps across refreshes.
    pub fn identity_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.kind,
            self.namespace().unwrap_or_default(),
            self.name()
        )
    }
}

/// `kubectl get <kind> -o json` wraps results in a `List`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub items: Vec<KubeResource>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kubectl_list_output_parses_into_typed_items() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [{
                "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
                "kind": "Kustomization",
                "metadata": {
                    "name": "apps",
                    "namespace": "flux-system",
                    "creationTimestamp": "2024-03-01T10:00:00Z",
                    "labels": { "team": "platform" }
                },
                "spec": { "sourceRef": { "kind": "GitRepository", "name": "flux-system" } },
                "status": { "conditions": [{ "type": "Ready", "status": "True" }] }
            }]
        });

        let list: ResourceList = serde_json::from_value(raw).unwrap();
        let item = &list.items[0];
        assert_eq!(item.kind, "Kustomization");
        assert_eq!(item.name(), "apps");
        assert_eq!(item.namespace(), Some("flux-system"));
        assert_eq!(item.metadata.labels["team"], "platform");
        assert_eq!(item.condition("Ready").unwrap()["status"], "True");
        assert!(item.condition("Reconciling").is_none());
        assert_eq!(item.identity_key(), "Kustomization/flux-system/apps");
    }

    #[test]
    fn cluster_scoped_objects_have_an_empty_namespace_segment() {
        let node: KubeResource = serde_json::from_value(json!({
            "kind": "Node",
            "metadata": { "name": "worker-1" }
        }))
        .unwrap();
        assert_eq!(node.identity_key(), "Node//worker-1");
        assert!(node.spec.is_null());
    }
}
