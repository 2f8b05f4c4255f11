// Install / uninstall the GitOps controllers through the `flux` and `az` CLIs
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::commands::process::{cluster_flags, run_cli};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::cluster::ClusterDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagedOptions {
    /// Azure ARC connected cluster rather than AKS
    pub hybrid: bool,
}

/// Mutating GitOps operations against a cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitOpsControl: Send + Sync {
    async fn install(&self, context: &str) -> Result<()>;

    async fn uninstall(&self, context: &str) -> Result<()>;

    /// Enables GitOps through the vendor's extension mechanism instead of `flux install`.
    async fn enable_managed(&self, cluster: &ClusterDescriptor, options: ManagedOptions)
        -> Result<()>;
}

pub struct FluxCli {
    flux: String,
    az: String,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
    resource_groups: HashMap<String, String>,
}

impl FluxCli {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            flux: settings.flux(),
            az: settings.az(),
            kubeconfig: settings.kubeconfig.clone(),
            timeout: settings.command_timeout(),
            resource_groups: settings.azure_resource_group.clone(),
        }
    }

    fn install_args(&self, context: &str) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        args.extend(cluster_flags(Some(context), self.kubeconfig.as_deref()));
        args
    }

    fn uninstall_args(&self, context: &str) -> Vec<String> {
        let mut args = vec!["uninstall".to_string(), "--silent".to_string()];
        args.extend(cluster_flags(Some(context), self.kubeconfig.as_deref()));
        args
    }

    fn managed_args(&self, cluster: &ClusterDescriptor, options: ManagedOptions) -> Result<Vec<String>> {
        let resource_group = self.resource_groups.get(&cluster.context).ok_or_else(|| {
            Error::command_failed(format!(
                "no Azure resource group configured for context {}",
                cluster.context
            ))
        })?;
        let cluster_type = if options.hybrid {
            "connectedClusters"
        } else {
            "managedClusters"
        };
        let cluster_name = if cluster.name.is_empty() {
            cluster.context.as_str()
        } else {
            cluster.name.as_str()
        };

        Ok([
            "k8s-extension",
            "create",
            "--name",
            "flux",
            "--extension-type",
            "microsoft.flux",
            "--scope",
            "cluster",
            "--cluster-type",
            cluster_type,
            "--cluster-name",
            cluster_name,
            "--resource-group",
            resource_group.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect())
    }
}

#[async_trait]
impl GitOpsControl for FluxCli {
    async fn install(&self, context: &str) -> Result<()> {
        log::info!("flux: installing on context {context}");
        run_cli(&self.flux, &self.install_args(context), self.timeout)
            .await
            .map_err(Error::command_failed)?;
        log::info!("flux: installed on context {context}");
        Ok(())
    }

    async fn uninstall(&self, context: &str) -> Result<()> {
        log::info!("flux: uninstalling from context {context}");
        run_cli(&self.flux, &self.uninstall_args(context), self.timeout)
            .await
            .map_err(Error::command_failed)?;
        log::info!("flux: uninstalled from context {context}");
        Ok(())
    }

    async fn enable_managed(
        &self,
        cluster: &ClusterDescriptor,
        options: ManagedOptions,
    ) -> Result<()> {
        let args = self.managed_args(cluster, options)?;
        log::info!(
            "flux: enabling managed GitOps on {} (hybrid: {})",
            cluster.context,
            options.hybrid
        );
        run_cli(&self.az, &args, self.timeout)
            .await
            .map_err(Error::command_failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> FluxCli {
        let mut settings = Settings {
            flux_path: Some("flux".to_string()),
            az_path: Some("az".to_string()),
            ..Settings::default()
        };
        settings
            .azure_resource_group
            .insert("aks-prod".to_string(), "rg-prod".to_string());
        FluxCli::from_settings(&settings)
    }

    #[test]
    fn install_targets_the_context() {
        assert_eq!(cli().install_args("kind-dev"), vec!["install", "--context=kind-dev"]);
    }

    #[test]
    fn uninstall_never_prompts() {
        assert_eq!(
            cli().uninstall_args("kind-dev"),
            vec!["uninstall", "--silent", "--context=kind-dev"]
        );
    }

    #[test]
    fn managed_enable_picks_cluster_type_from_hybrid_flag() {
        let cluster = ClusterDescriptor::new("prod", "aks-prod");

        let aks = cli().managed_args(&cluster, ManagedOptions { hybrid: false }).unwrap();
        assert!(aks.windows(2).any(|w| w == ["--cluster-type", "managedClusters"]));
        assert!(aks.windows(2).any(|w| w == ["--cluster-name", "prod"]));
        assert!(aks.windows(2).any(|w| w == ["--resource-group", "rg-prod"]));

        let arc = cli().managed_args(&cluster, ManagedOptions { hybrid: true }).unwrap();
        assert!(arc.windows(2).any(|w| w == ["--cluster-type", "connectedClusters"]));
    }

    #[test]
    fn managed_enable_without_resource_group_fails_before_running_az() {
        let cluster = ClusterDescriptor::new("edge", "arc-edge");
        let err = cli()
            .managed_args(&cluster, ManagedOptions { hybrid: true })
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed(_)));
    }

    #[cfg(unix)]
    mod against_a_fake_flux {
        use super::*;
        use crate::commands::process::fake_cli;

        fn cli_with(dir: &tempfile::TempDir, body: &str) -> FluxCli {
            let flux = fake_cli(dir.path(), "flux", body);
            FluxCli::from_settings(&Settings {
                flux_path: Some(flux.to_string_lossy().into_owned()),
                az_path: Some("az".to_string()),
                command_timeout_secs: 5,
                ..Settings::default()
            })
        }

        #[tokio::test]
        async fn failed_install_is_a_command_failure_carrying_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let err = cli_with(&dir, "echo 'install failed: timeout waiting for pods' >&2; exit 1")
                .install("kind-dev")
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::CommandFailed(ref msg) if msg.contains("timeout waiting for pods")),
                "{err}"
            );
        }

        #[tokio::test]
        async fn uninstall_passes_the_context_through() {
            let dir = tempfile::tempdir().unwrap();
            let cli = cli_with(&dir, r#"[ "$3" = "--context=kind-dev" ] || exit 9"#);
            cli.uninstall("kind-dev").await.unwrap();
            assert!(cli.uninstall("other").await.is_err());
        }
    }
}
