// Cluster queries through `kubectl get -o json`
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::commands::process::{cluster_flags, run_cli};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::k8s::{KubeResource, ResourceList};

/// Where a listing looks: which kubeconfig context, and which namespace
/// (`None` means all namespaces).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryScope {
    pub context: Option<String>,
    pub namespace: Option<String>,
}

impl QueryScope {
    pub fn context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Lists cluster objects of one resource type.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// `kind` is anything `kubectl get` accepts, e.g. `nodes` or
    /// `kustomizations.kustomize.toolkit.fluxcd.io`.
    async fn list_resources(&self, kind: &str, scope: &QueryScope) -> Result<Vec<KubeResource>>;
}

pub struct KubectlQuery {
    kubectl: String,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl KubectlQuery {
    pub fn new(kubectl: impl Into<String>, kubeconfig: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            kubectl: kubectl.into(),
            kubeconfig,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.kubectl(),
            settings.kubeconfig.clone(),
            settings.command_timeout(),
        )
    }

    fn list_args(&self, kind: &str, scope: &QueryScope) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            kind.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        match &scope.namespace {
            Some(ns) => {
                args.push("-n".to_string());
                args.push(ns.clone());
            }
            None => args.push("--all-namespaces".to_string()),
        }
        args.extend(cluster_flags(
            scope.context.as_deref(),
            self.kubeconfig.as_deref(),
        ));
        args
    }
}

#[async_trait]
impl ClusterQuery for KubectlQuery {
    async fn list_resources(&self, kind: &str, scope: &QueryScope) -> Result<Vec<KubeResource>> {
        let args = self.list_args(kind, scope);
        let stdout = run_cli(&self.kubectl, &args, self.timeout)
            .await
            .map_err(Error::query_failed)?;
        parse_list(kind, &stdout)
    }
}

fn parse_list(kind: &str, stdout: &str) -> Result<Vec<KubeResource>> {
    let list: ResourceList = serde_json::from_str(stdout)
        .map_err(|e| Error::query_failed(format!("unexpected `kubectl get {kind}` output: {e}")))?;
    log::debug!("kubectl: {} {kind} item(s)", list.items.len());
    Ok(list.items)
}

// ── resource locators ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

/// Builds the locator a host opens to show one resource's manifest.
pub trait ResourceUriResolver: Send + Sync {
    /// `kind_name` is `Kind/name`.
    fn resolve(&self, namespace: Option<&str>, kind_name: &str, format: OutputFormat) -> String;
}

/// `k8s-resource://<namespace>/<Kind>/<name>.<ext>`; cluster-scoped objects use `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubernetesUriResolver;

impl ResourceUriResolver for KubernetesUriResolver {
    fn resolve(&self, namespace: Option<&str>, kind_name: &str, format: OutputFormat) -> String {
        let namespace = namespace.filter(|ns| !ns.is_empty()).unwrap_or("_");
        format!(
            "k8s-resource://{namespace}/{kind_name}.{}",
            format.extension()
        )
    }
}
