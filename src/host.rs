//! Headless terminal host: prints views and runs the enable / disable
//! workflow with prompts on stdin and notices on stderr.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cluster::ClusterProviderDetector;
use crate::commands::flux::FluxCli;
use crate::commands::kubeconfig::KubeconfigLoader;
use crate::commands::kubectl::{ClusterQuery, KubectlQuery};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::gitops::{Action, Confirmer, GitOpsLifecycle, Notice, NoticeLevel, Notifier, Outcome};
use crate::tree::node::CollapseState;
use crate::tree::providers::{
    ClusterDataProvider, SourceDataProvider, TemplateDataProvider, WorkloadDataProvider,
};
use crate::tree::snapshot::NodeRef;
use crate::tree::view::{TreeRefresher, TreeViewController, TreeViews};

pub const VIEW_NAMES: [&str; 4] = ["clusters", "sources", "workloads", "templates"];

/// Asks on stderr and reads the answer from stdin.
pub struct TerminalConfirmer {
    assume_yes: bool,
}

impl TerminalConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

fn is_affirmative(answer: &str, affirmative: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case(affirmative)
        || answer.eq_ignore_ascii_case("y")
        || answer.eq_ignore_ascii_case("yes")
}

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, message: &str, affirmative: &str) -> bool {
        if self.assume_yes {
            log::debug!("host: auto-confirming \"{message}\"");
            return true;
        }
        eprint!("{message} [{affirmative}/No] ");

        let mut answer = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut answer).await {
            Ok(_) => is_affirmative(&answer, affirmative),
            Err(e) => {
                log::warn!("host: cannot read answer: {e}");
                false
            }
        }
    }
}

pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        let prefix = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        eprintln!("{prefix}: {}", notice.message);
    }
}

/// Renders a tree one node per line, two spaces of indent per level.
/// Collapsible nodes are marked `+`, expanded ones `-`; every level is shown.
pub fn render_tree(roots: &[NodeRef]) -> String {
    let mut out = String::new();
    for root in roots {
        render_node(&mut out, root, 0);
    }
    out
}

fn render_node(out: &mut String, node: &NodeRef, depth: usize) {
    let tree_node = node.node();
    let marker = match tree_node.collapse_state() {
        CollapseState::None => ' ',
        CollapseState::Collapsed => '+',
        CollapseState::Expanded => '-',
    };
    let _ = write!(out, "{:indent$}{marker} {}", "", tree_node.label, indent = depth * 2);
    if let Some(description) = &tree_node.description {
        let _ = write!(out, "  ({description})");
    }
    out.push('\n');
    for child in node.children() {
        render_node(out, &child, depth + 1);
    }
}

/// Everything the binary needs, wired from settings.
pub struct App {
    loader: Arc<KubeconfigLoader>,
    views: Arc<TreeViews>,
    lifecycle: GitOpsLifecycle,
}

impl App {
    pub fn new(settings: &Settings, assume_yes: bool) -> Self {
        let query: Arc<dyn ClusterQuery> = Arc::new(KubectlQuery::from_settings(settings));
        let loader = Arc::new(KubeconfigLoader::new(settings.kubeconfig.clone()));

        let views = Arc::new(TreeViews::new());
        views.register(Arc::new(TreeViewController::new(
            "clusters",
            Arc::new(ClusterDataProvider::new(
                loader.clone(),
                query.clone(),
                settings.flux_namespace.clone(),
            )),
        )));
        views.register(Arc::new(TreeViewController::new(
            "sources",
            Arc::new(SourceDataProvider::new(query.clone())),
        )));
        views.register(Arc::new(TreeViewController::new(
            "workloads",
            Arc::new(WorkloadDataProvider::new(query.clone())),
        )));
        views.register(Arc::new(TreeViewController::new(
            "templates",
            Arc::new(TemplateDataProvider::new(query.clone())),
        )));

        let lifecycle = GitOpsLifecycle::new(
            loader.clone(),
            Arc::new(ClusterProviderDetector::new(
                query,
                settings.cluster_providers.clone(),
            )),
            Arc::new(TerminalConfirmer::new(assume_yes)),
            Arc::new(StderrNotifier),
            Arc::new(FluxCli::from_settings(settings)),
            views.clone(),
        );

        Self {
            loader,
            views,
            lifecycle,
        }
    }

    /// Builds a view and returns it rendered, or its error state.
    pub async fn show_tree(&self, name: &str) -> Result<String> {
        let view = self.views.get(name).ok_or_else(|| {
            Error::config(format!(
                "unknown view {name}, expected one of {}",
                self.views.names().join(", ")
            ))
        })?;

        let roots = view.get_children(None).await;
        if let Some(e) = view.last_error() {
            return Ok(format!("{name}: {e}\n"));
        }
        if roots.is_empty() {
            return Ok(format!("{name}: no items\n"));
        }
        Ok(render_tree(&roots))
    }

    /// Runs enable or disable on the named context, or the current one.
    pub async fn run_lifecycle(&self, action: Action, context: Option<&str>) -> Result<Outcome> {
        let cluster = match context {
            Some(name) => {
                let loader = Arc::clone(&self.loader);
                let owned = name.to_string();
                let found = tokio::task::spawn_blocking(move || loader.cluster_for_context(&owned))
                    .await
                    .map_err(|e| Error::kubeconfig(format!("kubeconfig read aborted: {e}")))??;
                Some(found.ok_or_else(|| Error::kubeconfig(format!("no context named {name}")))?)
            }
            None => None,
        };
        let outcome = self.lifecycle.run(cluster, action).await?;
        refresh_after(outcome, &*self.views);
        Ok(outcome)
    }
}

/// A managed enable leaves refreshing to the host; the generic paths already
/// refreshed inside the lifecycle.
fn refresh_after(outcome: Outcome, refresher: &dyn TreeRefresher) {
    if let Outcome::DelegatedToManaged { .. } = outcome {
        refresher.refresh_all();
    }
}

pub fn describe_outcome(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::NoTarget => "no cluster selected",
        Outcome::UnknownProvider => "cluster provider could not be determined",
        Outcome::Declined => "cancelled",
        Outcome::NotSupported => "not supported on this cluster",
        Outcome::DelegatedToManaged { hybrid: false } => "GitOps extension requested on AKS",
        Outcome::DelegatedToManaged { hybrid: true } => "GitOps extension requested on Azure ARC",
        Outcome::Installed => "GitOps installed",
        Outcome::Uninstalled => "GitOps uninstalled",
    }
}
