//! Enable / disable GitOps on a cluster
//!
//! One linear workflow: resolve the target, detect its provider, confirm with
//! the user, then dispatch. Every early exit happens before the first
//! mutating call, so an aborted run leaves nothing to undo.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::cluster::ProviderDetector;
use crate::commands::flux::{GitOpsControl, ManagedOptions};
use crate::error::{Error, Result};
use crate::models::cluster::{ClusterDescriptor, ProviderKind};
use crate::tree::view::TreeRefresher;

pub const MANAGED_DISABLE_NOT_SUPPORTED: &str =
    "Disable GitOps is not yet implemented on AKS or Azure ARC";

/// Supplies the cluster a command applies to when none was passed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    async fn current_cluster(&self) -> Option<ClusterDescriptor>;
}

/// Blocking yes/no question. Any answer but the affirmative one is a no.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, message: &str, affirmative: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub modal: bool,
}

/// Shows a message to the user.
#[cfg_attr(test, automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Enable,
    Disable,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Enable => "enable",
            Action::Disable => "disable",
        }
    }

    fn button(self) -> &'static str {
        match self {
            Action::Enable => "Enable",
            Action::Disable => "Disable",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// How a run ended when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No cluster passed and none selected
    NoTarget,
    UnknownProvider,
    Declined,
    /// Disable on a managed provider; the user was told
    NotSupported,
    /// Handed to the vendor-specific enable routine, which owns any refresh
    DelegatedToManaged { hybrid: bool },
    Installed,
    Uninstalled,
}

pub struct GitOpsLifecycle {
    resolver: Arc<dyn ClusterResolver>,
    detector: Arc<dyn ProviderDetector>,
    confirmer: Arc<dyn Confirmer>,
    notifier: Arc<dyn Notifier>,
    control: Arc<dyn GitOpsControl>,
    refresher: Arc<dyn TreeRefresher>,
}

impl GitOpsLifecycle {
    pub fn new(
        resolver: Arc<dyn ClusterResolver>,
        detector: Arc<dyn ProviderDetector>,
        confirmer: Arc<dyn Confirmer>,
        notifier: Arc<dyn Notifier>,
        control: Arc<dyn GitOpsControl>,
        refresher: Arc<dyn TreeRefresher>,
    ) -> Self {
        Self {
            resolver,
            detector,
            confirmer,
            notifier,
            control,
            refresher,
        }
    }

    /// Install GitOps on `cluster`, or on the current cluster when `None`.
    pub async fn enable(&self, cluster: Option<ClusterDescriptor>) -> Result<Outcome> {
        self.run(cluster, Action::Enable).await
    }

    /// Uninstall GitOps from `cluster`, or from the current cluster when `None`.
    pub async fn disable(&self, cluster: Option<ClusterDescriptor>) -> Result<Outcome> {
        self.run(cluster, Action::Disable).await
    }

    pub async fn run(&self, cluster: Option<ClusterDescriptor>, action: Action) -> Result<Outcome> {
        let cluster = match cluster {
            Some(cluster) => cluster,
            None => match self.resolver.current_cluster().await {
                Some(cluster) => cluster,
                None => {
                    log::debug!("gitops: {action}: no cluster selected");
                    return Ok(Outcome::NoTarget);
                }
            },
        };

        let provider = self.detector.detect(&cluster).await;
        if provider == ProviderKind::Unknown {
            log::info!("gitops: {action}: provider of {} is unknown", cluster.context);
            return Ok(Outcome::UnknownProvider);
        }
        let cluster = cluster.with_provider(provider);

        let name = if cluster.name.is_empty() {
            "current"
        } else {
            cluster.name.as_str()
        };
        let message = format!("Do you want to {action} gitops on the {name} cluster?");
        if !self.confirmer.confirm(&message, action.button()).await {
            log::debug!("gitops: {action} on {} declined", cluster.context);
            return Ok(Outcome::Declined);
        }

        match (provider.is_managed(), action) {
            (true, Action::Enable) => {
                let hybrid = provider == ProviderKind::AzureArc;
                self.control
                    .enable_managed(&cluster, ManagedOptions { hybrid })
                    .await
                    .map_err(|e| self.surface(e))?;
                Ok(Outcome::DelegatedToManaged { hybrid })
            }
            (true, Action::Disable) => {
                self.notifier.notify(Notice {
                    level: NoticeLevel::Info,
                    message: MANAGED_DISABLE_NOT_SUPPORTED.to_string(),
                    modal: true,
                });
                Ok(Outcome::NotSupported)
            }
            (false, Action::Enable) => {
                self.control
                    .install(&cluster.context)
                    .await
                    .map_err(|e| self.surface(e))?;
                self.refresher.refresh_all();
                Ok(Outcome::Installed)
            }
            (false, Action::Disable) => {
                self.control
                    .uninstall(&cluster.context)
                    .await
                    .map_err(|e| self.surface(e))?;
                self.refresher.refresh_all();
                Ok(Outcome::Uninstalled)
            }
        }
    }

    fn surface(&self, error: Error) -> Error {
        log::error!("gitops: {error}");
        self.notifier.notify(Notice {
            level: NoticeLevel::Error,
            message: error.to_string(),
            modal: false,
        });
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockProviderDetector;
    use crate::commands::flux::MockGitOpsControl;
    use crate::tree::view::MockTreeRefresher;
    use mockall::predicate::*;

    /// Mocks that fail the test on any call not explicitly expected.
    struct Harness {
        resolver: MockClusterResolver,
        detector: MockProviderDetector,
        confirmer: MockConfirmer,
        notifier: MockNotifier,
        control: MockGitOpsControl,
        refresher: MockTreeRefresher,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                resolver: MockClusterResolver::new(),
                detector: MockProviderDetector::new(),
                confirmer: MockConfirmer::new(),
                notifier: MockNotifier::new(),
                control: MockGitOpsControl::new(),
                refresher: MockTreeRefresher::new(),
            }
        }

        fn detects(mut self, provider: ProviderKind) -> Self {
            self.detector
                .expect_detect()
                .times(1)
                .returning(move |_| provider);
            self
        }

        fn answers(mut self, yes: bool) -> Self {
            self.confirmer
                .expect_confirm()
                .times(1)
                .returning(move |_, _| yes);
            self
        }

        fn build(self) -> GitOpsLifecycle {
            GitOpsLifecycle::new(
                Arc::new(self.resolver),
                Arc::new(self.detector),
                Arc::new(self.confirmer),
                Arc::new(self.notifier),
                Arc::new(self.control),
                Arc::new(self.refresher),
            )
        }
    }

    fn prod() -> ClusterDescriptor {
        ClusterDescriptor::new("prod", "prod-admin")
    }

    // ==========================================================================
    // Story: nothing to act on
    // ==========================================================================

    #[tokio::test]
    async fn when_no_cluster_is_passed_or_selected_nothing_happens() {
        let mut h = Harness::new();
        h.resolver.expect_current_cluster().times(1).returning(|| None);
        h.detector.expect_detect().times(0);
        h.confirmer.expect_confirm().times(0);

        let outcome = h.build().enable(None).await.unwrap();
        assert_eq!(outcome, Outcome::NoTarget);
    }

    #[tokio::test]
    async fn when_no_cluster_is_passed_the_current_one_is_used() {
        let mut h = Harness::new().detects(ProviderKind::Generic).answers(true);
        h.resolver
            .expect_current_cluster()
            .times(1)
            .returning(|| Some(ClusterDescriptor::new("dev", "kind-dev")));
        h.control
            .expect_install()
            .with(eq("kind-dev"))
            .times(1)
            .returning(|_| Ok(()));
        h.refresher.expect_refresh_all().times(1).return_const(());

        let outcome = h.build().enable(None).await.unwrap();
        assert_eq!(outcome, Outcome::Installed);
    }

    #[tokio::test]
    async fn when_provider_is_unknown_no_prompt_and_no_backend_call() {
        let mut h = Harness::new().detects(ProviderKind::Unknown);
        h.confirmer.expect_confirm().times(0);
        h.control.expect_install().times(0);
        h.control.expect_enable_managed().times(0);
        h.notifier.expect_notify().times(0);

        let outcome = h.build().enable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::UnknownProvider);
    }

    // ==========================================================================
    // Story: confirmation gates every mutation
    // ==========================================================================

    #[tokio::test]
    async fn confirmation_names_action_and_cluster() {
        let mut h = Harness::new().detects(ProviderKind::Generic);
        h.confirmer
            .expect_confirm()
            .with(
                eq("Do you want to disable gitops on the prod cluster?"),
                eq("Disable"),
            )
            .times(1)
            .returning(|_, _| false);

        h.build().disable(Some(prod())).await.unwrap();
    }

    #[tokio::test]
    async fn unnamed_cluster_is_called_current() {
        let mut h = Harness::new().detects(ProviderKind::Generic);
        h.confirmer
            .expect_confirm()
            .with(
                eq("Do you want to enable gitops on the current cluster?"),
                eq("Enable"),
            )
            .times(1)
            .returning(|_, _| false);

        h.build()
            .enable(Some(ClusterDescriptor::new("", "ctx")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn when_user_declines_no_backend_call_occurs() {
        let mut h = Harness::new().detects(ProviderKind::Aks).answers(false);
        h.control.expect_install().times(0);
        h.control.expect_uninstall().times(0);
        h.control.expect_enable_managed().times(0);
        h.refresher.expect_refresh_all().times(0);

        let outcome = h.build().enable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::Declined);
    }

    // ==========================================================================
    // Story: managed providers
    // ==========================================================================

    #[tokio::test]
    async fn aks_enable_delegates_without_hybrid_flag() {
        let mut h = Harness::new().detects(ProviderKind::Aks).answers(true);
        h.control
            .expect_enable_managed()
            .withf(|cluster, options| {
                cluster.context == "prod-admin"
                    && cluster.provider == ProviderKind::Aks
                    && !options.hybrid
            })
            .times(1)
            .returning(|_, _| Ok(()));
        h.control.expect_install().times(0);
        h.refresher.expect_refresh_all().times(0);

        let outcome = h.build().enable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::DelegatedToManaged { hybrid: false });
    }

    #[tokio::test]
    async fn arc_enable_delegates_with_hybrid_flag() {
        let mut h = Harness::new().detects(ProviderKind::AzureArc).answers(true);
        h.control
            .expect_enable_managed()
            .withf(|_, options| options.hybrid)
            .times(1)
            .returning(|_, _| Ok(()));
        h.control.expect_install().times(0);
        h.refresher.expect_refresh_all().times(0);

        let outcome = h.build().enable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::DelegatedToManaged { hybrid: true });
    }

    #[tokio::test]
    async fn managed_disable_shows_not_supported_notice_and_calls_nothing() {
        for provider in [ProviderKind::Aks, ProviderKind::AzureArc] {
            let mut h = Harness::new().detects(provider).answers(true);
            h.notifier
                .expect_notify()
                .withf(|notice| {
                    notice.level == NoticeLevel::Info
                        && notice.modal
                        && notice.message == MANAGED_DISABLE_NOT_SUPPORTED
                })
                .times(1)
                .return_const(());
            h.control.expect_uninstall().times(0);
            h.control.expect_enable_managed().times(0);
            h.refresher.expect_refresh_all().times(0);

            let outcome = h.build().disable(Some(prod())).await.unwrap();
            assert_eq!(outcome, Outcome::NotSupported);
        }
    }

    #[tokio::test]
    async fn managed_enable_failure_is_surfaced() {
        let mut h = Harness::new().detects(ProviderKind::Aks).answers(true);
        h.control
            .expect_enable_managed()
            .returning(|_, _| Err(Error::command_failed("az: extension already exists")));
        h.notifier
            .expect_notify()
            .withf(|notice| notice.level == NoticeLevel::Error)
            .times(1)
            .return_const(());

        let err = h.build().enable(Some(prod())).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed(_)));
    }

    // ==========================================================================
    // Story: generic clusters
    // ==========================================================================

    #[tokio::test]
    async fn generic_enable_installs_then_refreshes_once() {
        let mut h = Harness::new().detects(ProviderKind::Generic).answers(true);
        h.control
            .expect_install()
            .with(eq("prod-admin"))
            .times(1)
            .returning(|_| Ok(()));
        h.control.expect_enable_managed().times(0);
        h.refresher.expect_refresh_all().times(1).return_const(());

        let outcome = h.build().enable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::Installed);
    }

    #[tokio::test]
    async fn generic_disable_uninstalls_then_refreshes_once() {
        let mut h = Harness::new().detects(ProviderKind::Generic).answers(true);
        h.control
            .expect_uninstall()
            .with(eq("prod-admin"))
            .times(1)
            .returning(|_| Ok(()));
        h.refresher.expect_refresh_all().times(1).return_const(());

        let outcome = h.build().disable(Some(prod())).await.unwrap();
        assert_eq!(outcome, Outcome::Uninstalled);
    }

    #[tokio::test]
    async fn failed_install_shows_error_and_skips_refresh() {
        let mut h = Harness::new().detects(ProviderKind::Generic).answers(true);
        h.control
            .expect_install()
            .times(1)
            .returning(|_| Err(Error::command_failed("flux install: context deadline exceeded")));
        h.refresher.expect_refresh_all().times(0);
        h.notifier
            .expect_notify()
            .withf(|notice| {
                notice.level == NoticeLevel::Error && notice.message.contains("deadline exceeded")
            })
            .times(1)
            .return_const(());

        let err = h.build().enable(Some(prod())).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed(_)));
    }
}
