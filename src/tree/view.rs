//! Tree view controllers: the bridge between a host that pulls children and a
//! data provider that builds whole snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::tree::provider::DataProvider;
use crate::tree::snapshot::{NodeRef, TreeSnapshot};

type SharedBuild = Shared<BoxFuture<'static, Result<Arc<TreeSnapshot>>>>;

#[derive(Default)]
struct ViewState {
    snapshot: Option<Arc<TreeSnapshot>>,
    stale: bool,
    in_flight: Option<SharedBuild>,
    last_error: Option<Error>,
}

/// Owns one data provider and the live snapshot of its view.
///
/// At most one build runs at a time: callers arriving while a build is in
/// flight await that same build and observe the same snapshot. A failed
/// build keeps the previous snapshot and records the error.
pub struct TreeViewController {
    name: String,
    provider: Arc<dyn DataProvider>,
    state: Mutex<ViewState>,
    changes: watch::Sender<u64>,
}

impl TreeViewController {
    pub fn new(name: impl Into<String>, provider: Arc<dyn DataProvider>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            name: name.into(),
            provider,
            state: Mutex::new(ViewState::default()),
            changes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Roots of the view when `node` is `None`, otherwise the node's children.
    ///
    /// Children come straight from the snapshot the node belongs to; only the
    /// root request can trigger a build. When a build fails the previous roots
    /// are returned, or none if there never was a snapshot.
    pub async fn get_children(&self, node: Option<&NodeRef>) -> Vec<NodeRef> {
        if let Some(node) = node {
            return node.children();
        }
        match self.root_snapshot().await {
            Some(snapshot) => NodeRef::roots(&snapshot),
            None => Vec::new(),
        }
    }

    async fn root_snapshot(&self) -> Option<Arc<TreeSnapshot>> {
        {
            let state = self.lock();
            if !state.stale {
                if let Some(snapshot) = &state.snapshot {
                    return Some(Arc::clone(snapshot));
                }
            }
        }
        match self.build().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!("tree: {} view build failed: {e}", self.name);
                self.lock().snapshot.clone()
            }
        }
    }

    /// Marks the snapshot stale and tells subscribers the tree changed. The
    /// next root request rebuilds.
    pub fn invalidate(&self) {
        self.lock().stale = true;
        self.changes.send_modify(|generation| *generation += 1);
        log::debug!("tree: {} view invalidated", self.name);
    }

    /// Invalidates, then builds (or joins the build already running).
    pub async fn refresh(&self) -> Result<Arc<TreeSnapshot>> {
        self.invalidate();
        self.build().await
    }

    /// Generation counter bumped on every invalidation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Error of the most recent failed build, cleared by a successful one.
    pub fn last_error(&self) -> Option<Error> {
        self.lock().last_error.clone()
    }

    /// The live snapshot, stale or not.
    pub fn snapshot(&self) -> Option<Arc<TreeSnapshot>> {
        self.lock().snapshot.clone()
    }

    async fn build(&self) -> Result<Arc<TreeSnapshot>> {
        let build = {
            let mut state = self.lock();
            match &state.in_flight {
                Some(build) => {
                    log::debug!("tree: {} view joining build in flight", self.name);
                    build.clone()
                }
                None => {
                    let provider = Arc::clone(&self.provider);
                    let build = async move { provider.build_tree().await.map(Arc::new) }
                        .boxed()
                        .shared();
                    state.in_flight = Some(build.clone());
                    build
                }
            }
        };

        let result = build.clone().await;

        // Every joined caller gets here; only the first settles the state.
        let mut state = self.lock();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&build))
        {
            state.in_flight = None;
            state.stale = false;
            match &result {
                Ok(snapshot) => {
                    state.snapshot = Some(Arc::clone(snapshot));
                    state.last_error = None;
                    log::debug!("tree: {} view built {} node(s)", self.name, snapshot.len());
                }
                Err(e) => state.last_error = Some(e.clone()),
            }
        }
        result
    }
}

/// Invalidates every open view.
#[cfg_attr(test, automock)]
pub trait TreeRefresher: Send + Sync {
    fn refresh_all(&self);
}

/// The open views of the host.
#[derive(Default)]
pub struct TreeViews {
    views: Mutex<Vec<Arc<TreeViewController>>>,
}

impl TreeViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, view: Arc<TreeViewController>) {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view);
    }

    pub fn get(&self, name: &str) -> Option<Arc<TreeViewController>> {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|v| v.name().to_string())
            .collect()
    }
}

impl TreeRefresher for TreeViews {
    fn refresh_all(&self) {
        let views = self
            .views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for view in views {
            view.invalidate();
        }
    }
}
