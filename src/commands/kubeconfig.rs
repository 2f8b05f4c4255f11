use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use kube::config::Kubeconfig;

use crate::error::{Error, Result};
use crate::gitops::ClusterResolver;
use crate::models::cluster::ClusterDescriptor;
use crate::models::k8s::KubeContext;

// ── helpers ───────────────────────────────────────────────────────────────────

/// Files listed in KUBECONFIG (`:` on Unix, `;` on Windows), in order.
fn env_kubeconfig_paths(value: &str) -> Vec<PathBuf> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Candidate kubeconfig files in `dir`: anything but directories and
/// dotfiles, in name order.
fn scan_kube_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("kubeconfig: cannot read directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|kind| !kind.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    candidates
}

/// A merged kubeconfig plus the file each context was first seen in.
struct LoadedKubeconfig {
    config: Kubeconfig,
    context_sources: HashMap<String, PathBuf>,
}

impl LoadedKubeconfig {
    fn first(path: &Path, config: Kubeconfig) -> Self {
        let mut loaded = Self {
            config: Kubeconfig::default(),
            context_sources: HashMap::new(),
        };
        loaded.absorb(path, config);
        loaded
    }

    /// Appends every entry of `next`. The current context stays with the
    /// earliest file that names one.
    fn absorb(&mut self, path: &Path, next: Kubeconfig) {
        for named in &next.contexts {
            self.context_sources
                .entry(named.name.clone())
                .or_insert_with(|| path.to_path_buf());
        }
        self.config.clusters.extend(next.clusters);
        self.config.auth_infos.extend(next.auth_infos);
        self.config.contexts.extend(next.contexts);
        if self.config.current_context.is_none() {
            self.config.current_context = next.current_context;
        }
    }
}

/// Reads every readable kubeconfig among `paths`; `None` when none was.
fn load_from_paths(paths: &[PathBuf]) -> Option<LoadedKubeconfig> {
    let mut loaded: Option<LoadedKubeconfig> = None;

    for path in paths {
        if !path.exists() {
            log::info!("kubeconfig: skip (not found) {}", path.display());
            continue;
        }
        let config = match Kubeconfig::read_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("kubeconfig: skip (parse error: {e}) {}", path.display());
                continue;
            }
        };
        log::info!(
            "kubeconfig: ok ({} context(s)) {}",
            config.contexts.len(),
            path.display()
        );
        match loaded.as_mut() {
            Some(merged) => merged.absorb(path, config),
            None => loaded = Some(LoadedKubeconfig::first(path, config)),
        }
    }
    loaded
}

/// Flattens a merged kubeconfig into contexts. The first definition of a
/// context name wins, as with kubectl.
fn contexts_of(loaded: LoadedKubeconfig) -> Vec<KubeContext> {
    let LoadedKubeconfig {
        config,
        context_sources,
    } = loaded;
    let current = config.current_context.clone().unwrap_or_default();

    let mut cluster_servers: HashMap<String, String> = HashMap::new();
    for nc in &config.clusters {
        if let Some(server) = nc.cluster.as_ref().and_then(|c| c.server.clone()) {
            cluster_servers.entry(nc.name.clone()).or_insert(server);
        }
    }

    let mut seen = HashSet::new();
    config
        .contexts
        .into_iter()
        .filter(|named| seen.insert(named.name.clone()))
        .filter_map(|named| {
            let ctx = named.context?;
            let server_url = cluster_servers.get(&ctx.cluster).cloned();
            let source_file = context_sources
                .get(&named.name)
                .map(|p| p.to_string_lossy().to_string());
            Some(KubeContext {
                is_active: named.name == current,
                name: named.name,
                cluster: ctx.cluster,
                user: ctx.user.unwrap_or_default(),
                namespace: ctx.namespace,
                server_url,
                source_file,
            })
        })
        .collect()
}

// ── loader ────────────────────────────────────────────────────────────────────

/// Reads kubeconfig contexts.
#[cfg_attr(test, automock)]
pub trait ContextSource: Send + Sync {
    fn contexts(&self) -> Result<Vec<KubeContext>>;
}

/// Loads contexts the way kubectl would see them.
///
/// Resolution order:
/// 1. An explicit file from settings.
/// 2. Every file listed in KUBECONFIG, merged.
/// 3. When KUBECONFIG is unset (common when launched from a desktop icon that
///    does not inherit the shell environment), every regular file in ~/.kube
///    that parses as a kubeconfig, merged.
///
/// An explicit file or KUBECONFIG entry that yields nothing is an error; an
/// empty ~/.kube yields no contexts.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigLoader {
    explicit: Option<PathBuf>,
}

impl KubeconfigLoader {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Descriptor for a named context, if kubeconfig defines it.
    pub fn cluster_for_context(&self, name: &str) -> Result<Option<ClusterDescriptor>> {
        Ok(self
            .contexts()?
            .into_iter()
            .find(|c| c.name == name)
            .map(descriptor_for))
    }
}

impl ContextSource for KubeconfigLoader {
    fn contexts(&self) -> Result<Vec<KubeContext>> {
        if let Some(path) = &self.explicit {
            let loaded = load_from_paths(std::slice::from_ref(path)).ok_or_else(|| {
                Error::kubeconfig(format!("cannot load {}", path.display()))
            })?;
            return Ok(contexts_of(loaded));
        }

        let kube_env = std::env::var("KUBECONFIG").unwrap_or_default();
        log::debug!("kubeconfig: KUBECONFIG env = {:?}", kube_env);

        if !kube_env.is_empty() {
            let paths = env_kubeconfig_paths(&kube_env);
            let loaded = load_from_paths(&paths).ok_or_else(|| {
                Error::kubeconfig(format!("no readable kubeconfig in KUBECONFIG={kube_env}"))
            })?;
            return Ok(contexts_of(loaded));
        }

        let Some(home) = dirs::home_dir() else {
            log::warn!("kubeconfig: cannot determine home directory");
            return Ok(vec![]);
        };
        let kube_dir = home.join(".kube");
        log::debug!("kubeconfig: KUBECONFIG not set, scanning {}", kube_dir.display());

        match load_from_paths(&scan_kube_dir(&kube_dir)) {
            Some(loaded) => Ok(contexts_of(loaded)),
            None => {
                log::warn!(
                    "kubeconfig: no valid kubeconfig files found in {}",
                    kube_dir.display()
                );
                Ok(vec![])
            }
        }
    }
}

#[async_trait]
impl ClusterResolver for KubeconfigLoader {
    async fn current_cluster(&self) -> Option<ClusterDescriptor> {
        let loader = self.clone();
        match tokio::task::spawn_blocking(move || loader.contexts()).await {
            Ok(Ok(contexts)) => contexts.into_iter().find(|c| c.is_active).map(descriptor_for),
            Ok(Err(e)) => {
                log::warn!("kubeconfig: cannot resolve current cluster: {e}");
                None
            }
            Err(e) => {
                log::warn!("kubeconfig: kubeconfig read aborted: {e}");
                None
            }
        }
    }
}

pub fn descriptor_for(context: KubeContext) -> ClusterDescriptor {
    let mut cluster = ClusterDescriptor::new(context.cluster, context.name);
    cluster.server_url = context.server_url;
    cluster
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEV: &str = r#"
apiVersion: v1
kind: Config
current-context: kind-dev
clusters:
- name: kind-dev
  cluster:
    server: https://127.0.0.1:6443
contexts:
- name: kind-dev
  context:
    cluster: kind-dev
    user: kind-dev
users:
- name: kind-dev
  user: {}
"#;

    const PROD: &str = r#"
apiVersion: v1
kind: Config
current-context: aks-prod
clusters:
- name: prod
  cluster:
    server: https://prod.example.com
contexts:
- name: aks-prod
  context:
    cluster: prod
    user: admin
    namespace: apps
- name: kind-dev
  context:
    cluster: shadowed
    user: nobody
users:
- name: admin
  user: {}
"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn kubeconfig_env_value_splits_into_paths() {
        let sep = if cfg!(windows) { ";" } else { ":" };
        let value = format!("/a/config{sep} /b/config {sep}");
        assert_eq!(
            env_kubeconfig_paths(&value),
            vec![PathBuf::from("/a/config"), PathBuf::from("/b/config")]
        );
    }

    #[test]
    fn scan_skips_hidden_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "config", DEV);
        write(dir.path(), ".DS_Store", "junk");
        std::fs::create_dir(dir.path().join("cache")).unwrap();

        let paths = scan_kube_dir(dir.path());
        assert_eq!(paths, vec![dir.path().join("config")]);
    }

    #[test]
    fn merged_files_keep_first_current_context_and_first_context_definition() {
        let dir = tempfile::tempdir().unwrap();
        let dev = write(dir.path(), "a-dev", DEV);
        let prod = write(dir.path(), "b-prod", PROD);
        write(dir.path(), "c-notes", "not: [a kubeconfig");

        let loaded = load_from_paths(&scan_kube_dir(dir.path())).unwrap();
        let contexts = contexts_of(loaded);

        assert_eq!(contexts.len(), 2);
        let dev_ctx = &contexts[0];
        assert_eq!(dev_ctx.name, "kind-dev");
        assert_eq!(dev_ctx.cluster, "kind-dev");
        assert!(dev_ctx.is_active);
        assert_eq!(dev_ctx.server_url.as_deref(), Some("https://127.0.0.1:6443"));
        assert_eq!(dev_ctx.source_file.as_deref(), dev.to_str());

        let prod_ctx = &contexts[1];
        assert_eq!(prod_ctx.name, "aks-prod");
        assert!(!prod_ctx.is_active);
        assert_eq!(prod_ctx.namespace.as_deref(), Some("apps"));
        assert_eq!(prod_ctx.source_file.as_deref(), prod.to_str());
    }

    #[test]
    fn explicit_file_that_cannot_load_is_an_error() {
        let loader = KubeconfigLoader::new(Some(PathBuf::from("/nonexistent/kubeconfig")));
        assert!(matches!(loader.contexts(), Err(Error::Kubeconfig(_))));
    }

    #[tokio::test]
    async fn current_cluster_comes_from_current_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "config", PROD);
        let loader = KubeconfigLoader::new(Some(path));

        let cluster = loader.current_cluster().await.unwrap();
        assert_eq!(cluster.name, "prod");
        assert_eq!(cluster.context, "aks-prod");
        assert_eq!(cluster.server_url.as_deref(), Some("https://prod.example.com"));

        let named = loader.cluster_for_context("kind-dev").unwrap().unwrap();
        assert_eq!(named.name, "shadowed");
        assert!(loader.cluster_for_context("missing").unwrap().is_none());
    }
}
