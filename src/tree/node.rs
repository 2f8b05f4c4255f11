//! Tree nodes and the per-kind capability table.
//!
//! A node is one concrete type. What differs between kinds (icon, tooltip
//! rows, default action) is looked up in [`KindCapabilities`] rather than
//! expressed through separate node types.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::commands::kubectl::{OutputFormat, ResourceUriResolver};
use crate::models::k8s::KubeResource;
use crate::tree::snapshot::NodeId;

/// Command the host runs when a node with a bound resource is activated.
pub const OPEN_RESOURCE_COMMAND: &str = "gitops.editor.openResource";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollapseState {
    #[default]
    None,
    Collapsed,
    Expanded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icon {
    /// Built-in host icon id
    Theme(&'static str),
    /// `resources/icons/(dark|light)/<name>.svg`
    Asset(&'static str),
}

/// Stable identity of a node across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// `kind/namespace/name` of the bound resource
    Resource(String),
    /// Path of labels from the root for nodes without a resource
    Synthetic(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Resource(key) | NodeKey::Synthetic(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCommand {
    pub command: &'static str,
    pub title: &'static str,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cluster,
    Namespace,
    Deployment,
    GitRepository,
    OciRepository,
    HelmRepository,
    Bucket,
    Kustomization,
    HelmRelease,
    GitOpsTemplate,
    Other(String),
}

impl ResourceKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "cluster" => ResourceKind::Cluster,
            "namespace" => ResourceKind::Namespace,
            "deployment" => ResourceKind::Deployment,
            "gitrepository" => ResourceKind::GitRepository,
            "ocirepository" => ResourceKind::OciRepository,
            "helmrepository" => ResourceKind::HelmRepository,
            "bucket" => ResourceKind::Bucket,
            "kustomization" => ResourceKind::Kustomization,
            "helmrelease" => ResourceKind::HelmRelease,
            "gitopstemplate" => ResourceKind::GitOpsTemplate,
            _ => ResourceKind::Other(kind.to_string()),
        }
    }

    pub fn capabilities(&self) -> &'static KindCapabilities {
        match self {
            ResourceKind::Cluster => &CLUSTER,
            ResourceKind::Namespace => &NAMESPACE,
            ResourceKind::Deployment => &DEPLOYMENT,
            ResourceKind::GitRepository
            | ResourceKind::OciRepository
            | ResourceKind::HelmRepository
            | ResourceKind::Bucket => &SOURCE,
            ResourceKind::Kustomization | ResourceKind::HelmRelease => &WORKLOAD,
            ResourceKind::GitOpsTemplate => &TEMPLATE,
            ResourceKind::Other(_) => &GENERIC,
        }
    }
}

/// Per-kind rendering hooks.
pub struct KindCapabilities {
    pub icon: Option<Icon>,
    /// Rows appended after the common metadata rows of the tooltip
    pub tooltip_rows: fn(&KubeResource) -> Vec<(String, String)>,
    pub default_action: fn(&KubeResource, &dyn ResourceUriResolver) -> Option<NodeCommand>,
}

static CLUSTER: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Asset("cloud")),
    tooltip_rows: no_rows,
    default_action: no_action,
};

static NAMESPACE: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Theme("symbol-namespace")),
    tooltip_rows: no_rows,
    default_action: open_resource,
};

static DEPLOYMENT: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Asset("deployment")),
    tooltip_rows: deployment_rows,
    default_action: open_resource,
};

static SOURCE: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Asset("source")),
    tooltip_rows: source_rows,
    default_action: open_resource,
};

static WORKLOAD: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Asset("workload")),
    tooltip_rows: workload_rows,
    default_action: open_resource,
};

static TEMPLATE: KindCapabilities = KindCapabilities {
    icon: Some(Icon::Theme("notebook-template")),
    tooltip_rows: template_rows,
    default_action: open_resource,
};

static GENERIC: KindCapabilities = KindCapabilities {
    icon: None,
    tooltip_rows: no_rows,
    default_action: open_resource,
};

fn no_rows(_: &KubeResource) -> Vec<(String, String)> {
    Vec::new()
}

fn no_action(_: &KubeResource, _: &dyn ResourceUriResolver) -> Option<NodeCommand> {
    None
}

fn open_resource(resource: &KubeResource, resolver: &dyn ResourceUriResolver) -> Option<NodeCommand> {
    let locator = resolver.resolve(
        resource.namespace(),
        &format!("{}/{}", resource.kind, resource.name()),
        OutputFormat::Yaml,
    );
    Some(NodeCommand {
        command: OPEN_RESOURCE_COMMAND,
        title: "View Resource",
        arguments: vec![locator],
    })
}

fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(|v| v.as_str())
}

fn source_rows(resource: &KubeResource) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(url) = str_at(&resource.spec, "/url") {
        rows.push(("URL".to_string(), url.to_string()));
    }
    if let Some(branch) = str_at(&resource.spec, "/ref/branch") {
        rows.push(("Branch".to_string(), branch.to_string()));
    }
    if let Some(revision) = str_at(&resource.status, "/artifact/revision") {
        rows.push(("Revision".to_string(), revision.to_string()));
    }
    rows
}

fn workload_rows(resource: &KubeResource) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(source) = source_ref(resource) {
        rows.push(("Source".to_string(), source));
    }
    if let Some(path) = str_at(&resource.spec, "/path") {
        rows.push(("Path".to_string(), path.to_string()));
    }
    if let Some(chart) = str_at(&resource.spec, "/chart/spec/chart") {
        rows.push(("Chart".to_string(), chart.to_string()));
    }
    rows
}

fn deployment_rows(resource: &KubeResource) -> Vec<(String, String)> {
    container_image(resource)
        .map(|image| vec![("Image".to_string(), image.to_string())])
        .unwrap_or_default()
}

fn template_rows(resource: &KubeResource) -> Vec<(String, String)> {
    str_at(&resource.spec, "/description")
        .map(|d| vec![("Description".to_string(), d.to_string())])
        .unwrap_or_default()
}

/// `Kind/name` of a Flux workload's `spec.sourceRef` (HelmReleases keep it
/// under `spec.chart.spec.sourceRef`).
pub fn source_ref(resource: &KubeResource) -> Option<String> {
    let source = resource
        .spec
        .pointer("/sourceRef")
        .or_else(|| resource.spec.pointer("/chart/spec/sourceRef"))?;
    let kind = source.get("kind")?.as_str()?;
    let name = source.get("name")?.as_str()?;
    Some(format!("{kind}/{name}"))
}

pub fn container_image(resource: &KubeResource) -> Option<&str> {
    str_at(&resource.spec, "/template/spec/containers/0/image")
}

/// Compact age, e.g. `45s`, `12m`, `5h`, `3d`.
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}

fn markdown_table(rows: &[(String, String)]) -> String {
    let mut table = String::from("| Property | Value |\n| --- | --- |\n");
    for (key, value) in rows {
        let value = value.replace('|', "\\|").replace('\n', " ");
        table.push_str(&format!("| {key} | {value} |\n"));
    }
    table
}

/// VS Code style hosts accept a single context string per node.
///
/// ```
/// use gitops_explorer::tree::node::join_contexts;
/// assert_eq!(join_contexts(&["", "one", "two"]), "one;two;");
/// ```
///
/// Empty names are dropped, order is kept, duplicates are kept.
pub fn join_contexts(contexts: &[&str]) -> String {
    contexts
        .iter()
        .filter(|context| !context.is_empty())
        .map(|context| format!("{context};"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub(crate) key: NodeKey,
    pub label: String,
    pub description: Option<String>,
    pub context_value: String,
    pub(crate) kind: ResourceKind,
    pub(crate) icon: Option<Icon>,
    pub(crate) collapse: CollapseState,
    pub(crate) resource: Option<KubeResource>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl TreeNode {
    /// A node with no bound resource, e.g. a grouping header.
    pub fn new(label: impl Into<String>, kind: ResourceKind) -> Self {
        let label = label.into();
        Self {
            key: NodeKey::Synthetic(label.clone()),
            icon: kind.capabilities().icon.clone(),
            label,
            description: None,
            context_value: String::new(),
            kind,
            collapse: CollapseState::None,
            resource: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn for_resource(label: impl Into<String>, resource: KubeResource) -> Self {
        let kind = ResourceKind::from_kind(&resource.kind);
        Self {
            key: NodeKey::Resource(resource.identity_key()),
            icon: kind.capabilities().icon.clone(),
            label: label.into(),
            description: None,
            context_value: String::new(),
            kind,
            collapse: CollapseState::None,
            resource: Some(resource),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_context(mut self, contexts: &[&str]) -> Self {
        self.context_value = join_contexts(contexts);
        self
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn icon(&self) -> Option<&Icon> {
        self.icon.as_ref()
    }

    pub fn resource(&self) -> Option<&KubeResource> {
        self.resource.as_ref()
    }

    pub fn collapse_state(&self) -> CollapseState {
        self.collapse
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    pub fn make_collapsible(&mut self) {
        self.collapse = CollapseState::Collapsed;
    }

    /// Has no visible effect on a leaf.
    pub fn expand(&mut self) {
        self.collapse = CollapseState::Expanded;
    }

    /// Markdown table summarizing the bound resource.
    pub fn tooltip(&self) -> Option<String> {
        self.tooltip_at(Utc::now())
    }

    fn tooltip_at(&self, now: DateTime<Utc>) -> Option<String> {
        let resource = self.resource.as_ref()?;
        let mut rows = vec![
            ("Kind".to_string(), resource.kind.clone()),
            ("Name".to_string(), resource.name().to_string()),
        ];
        if let Some(ns) = resource.namespace() {
            rows.push(("Namespace".to_string(), ns.to_string()));
        }
        if let Some(created) = resource.metadata.creation_timestamp {
            rows.push((
                "Created".to_string(),
                format!("{} ({} ago)", created.to_rfc3339(), format_age(created, now)),
            ));
        }
        if !resource.metadata.labels.is_empty() {
            let labels = resource
                .metadata
                .labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            rows.push(("Labels".to_string(), labels));
        }
        if let Some(ready) = resource.condition("Ready") {
            let status = ready.get("status").and_then(|s| s.as_str()).unwrap_or("Unknown");
            let mut value = status.to_string();
            if let Some(message) = ready.get("message").and_then(|m| m.as_str()) {
                value.push_str(&format!(": {message}"));
            }
            rows.push(("Ready".to_string(), value));
        }
        rows.extend((self.kind.capabilities().tooltip_rows)(resource));
        Some(markdown_table(&rows))
    }

    /// Opens the bound resource's manifest; `None` for synthetic nodes.
    pub fn default_action(&self, resolver: &dyn ResourceUriResolver) -> Option<NodeCommand> {
        let resource = self.resource.as_ref()?;
        (self.kind.capabilities().default_action)(resource, resolver)
    }
}
