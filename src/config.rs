use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::cluster::ProviderKind;

const CONFIG_ENV: &str = "GITOPS_EXPLORER_CONFIG";

/// User settings, read from `config.yaml`. Every field is optional in the file;
/// an unrecognized key is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub kubectl_path: Option<String>,
    pub flux_path: Option<String>,
    pub az_path: Option<String>,
    /// Explicit kubeconfig; when unset KUBECONFIG and then ~/.kube are used
    pub kubeconfig: Option<PathBuf>,
    pub command_timeout_secs: u64,
    /// Namespace the GitOps controllers are installed into
    pub flux_namespace: String,
    /// context name → provider, skips detection for that context
    pub cluster_providers: HashMap<String, ProviderKind>,
    /// context name → Azure resource group, needed for managed enable
    pub azure_resource_group: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kubectl_path: None,
            flux_path: None,
            az_path: None,
            kubeconfig: None,
            command_timeout_secs: 120,
            flux_namespace: "flux-system".to_string(),
            cluster_providers: HashMap::new(),
            azure_resource_group: HashMap::new(),
        }
    }
}

impl Settings {
    /// Loads settings from `$GITOPS_EXPLORER_CONFIG`, else the user config dir.
    ///
    /// A missing file yields defaults; a file that exists but does not parse is
    /// an error. Binary overrides from the environment are applied last.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                log::debug!("config: {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
        log::info!("config: loaded {}", path.display());
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("KUBECTL_PATH") {
            self.kubectl_path = Some(v);
        }
        if let Some(v) = lookup("FLUX_PATH") {
            self.flux_path = Some(v);
        }
        if let Some(v) = lookup("AZ_PATH") {
            self.az_path = Some(v);
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn kubectl(&self) -> String {
        resolve_binary(self.kubectl_path.as_deref(), "kubectl")
    }

    pub fn flux(&self) -> String {
        resolve_binary(self.flux_path.as_deref(), "flux")
    }

    pub fn az(&self) -> String {
        resolve_binary(self.az_path.as_deref(), "az")
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gitops-explorer").join("config.yaml"))
}

/// Explicit path wins, then PATH lookup, then the bare name.
fn resolve_binary(configured: Option<&str>, name: &str) -> String {
    if let Some(path) = configured {
        return path.to_string();
    }
    which::which(name)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| name.to_string())
}
