use std::fmt;

use serde::{Deserialize, Serialize};

/// Flavor of cluster, which decides how GitOps is enabled or disabled on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Probing was inconclusive
    #[default]
    Unknown,
    /// Any cluster where `flux install` / `flux uninstall` is used directly
    Generic,
    /// Azure Kubernetes Service
    Aks,
    /// Azure ARC connected cluster
    AzureArc,
}

impl ProviderKind {
    /// Managed providers route GitOps enablement through the vendor instead of `flux install`.
    pub fn is_managed(self) -> bool {
        matches!(self, ProviderKind::Aks | ProviderKind::AzureArc)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Unknown => "Unknown",
            ProviderKind::Generic => "Generic",
            ProviderKind::Aks => "AKS",
            ProviderKind::AzureArc => "Azure ARC",
        };
        f.write_str(name)
    }
}

/// A cluster a GitOps command targets, resolved once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptor {
    /// Display name; may be empty when the host could not name the cluster
    pub name: String,
    /// kubeconfig context used for every CLI call against this cluster
    pub context: String,
    pub server_url: Option<String>,
    #[serde(default)]
    pub provider: ProviderKind,
}

impl ClusterDescriptor {
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
            server_url: None,
            provider: ProviderKind::Unknown,
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }
}
