//! Change-driven registry refreshes.
//!
//! Whatever observes the filesystem publishes [`WorkspaceEvent`]s; a single
//! background task drains them and re-scans the workspace. Events that queue
//! up while a scan runs collapse into one follow-up scan.
//!
//! The observer is either the editor (`workspace/didChangeWatchedFiles`) or,
//! for editors that cannot register file watchers, an in-process `notify`
//! watcher started with [`RegistryRefresher::watch_in_process`].

use crate::discovery::PRUNED_DIRS;
use crate::error::{Result, WorkspacesError};
use crate::manifest::MANIFEST_FILE;
use crate::package_manager::PackageManagerKind;
use crate::registry::WorkspaceRegistry;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A watched file was created, changed or deleted.
    Changed(PathBuf),
}

/// Handle to the background refresh task.
///
/// Dropping the handle closes the channel and ends the task.
pub struct RegistryRefresher {
    registry: Arc<WorkspaceRegistry>,
    events: mpsc::UnboundedSender<WorkspaceEvent>,
    watching: AtomicBool,
}

impl RegistryRefresher {
    /// Spawns the refresh task on the current tokio runtime.
    pub fn spawn(registry: Arc<WorkspaceRegistry>) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_refresh_loop(Arc::clone(&registry), rx));
        Self {
            registry,
            events,
            watching: AtomicBool::new(false),
        }
    }

    /// Marks the watch as set up. Returns `true` only for the first caller,
    /// so watch registration happens at most once.
    pub fn begin_watch(&self) -> bool {
        !self.watching.swap(true, Ordering::SeqCst)
    }

    /// Queues an event if `path` is one of the workspace's watched files.
    /// Returns whether a refresh was scheduled.
    pub fn notify(&self, path: &Path) -> bool {
        if !self.is_watched(path) {
            tracing::trace!("Ignoring change to {}", path.display());
            return false;
        }
        self.events
            .send(WorkspaceEvent::Changed(path.to_path_buf()))
            .is_ok()
    }

    /// Watched files: the current manager's files plus every known lockfile
    /// in the workspace root, so switching managers is picked up as well, and
    /// any member manifest below the root outside `node_modules`.
    pub fn is_watched(&self, path: &Path) -> bool {
        is_watched_by(&self.registry, path)
    }

    /// Starts an in-process watcher on the workspace root and on every member
    /// package directory. Member directories added by later refreshes are
    /// picked up as they appear.
    ///
    /// A degraded registry without a root watches nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspacesError::Watch`] when the platform watcher cannot be
    /// created or the root cannot be watched.
    pub fn watch_in_process(&self) -> Result<()> {
        let Some(root) = self.registry.root().map(Path::to_path_buf) else {
            return Ok(());
        };

        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) if !event.kind.is_access() => {
                    for path in event.paths {
                        if is_watched_by(&registry, &path)
                            && events.send(WorkspaceEvent::Changed(path)).is_err()
                        {
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("File watcher error: {}", e),
            },
        )
        .map_err(|source| WorkspacesError::Watch {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|source| WorkspacesError::Watch {
                path: root.clone(),
                source,
            })?;

        tracing::info!("Watching {} for workspace changes", root.display());
        tokio::spawn(track_member_dirs(watcher, Arc::clone(&self.registry)));
        Ok(())
    }
}

fn is_watched_by(registry: &WorkspaceRegistry, path: &Path) -> bool {
    let Some(root) = registry.root() else {
        return false;
    };
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    if path.parent() == Some(root) {
        return watched_file_names(registry.snapshot().package_manager)
            .iter()
            .any(|name| *name == file_name);
    }

    file_name == MANIFEST_FILE
        && !relative
            .components()
            .any(|c| PRUNED_DIRS.iter().any(|dir| c.as_os_str() == *dir))
}

/// Keeps the watcher's member directories in step with the published
/// snapshots. Owns the watcher for as long as the registry publishes.
async fn track_member_dirs(mut watcher: RecommendedWatcher, registry: Arc<WorkspaceRegistry>) {
    let mut rx = registry.subscribe();
    let mut watched: HashSet<PathBuf> = HashSet::new();

    loop {
        let snapshot = Arc::clone(&rx.borrow_and_update());
        let current: HashSet<PathBuf> = snapshot.packages.iter().map(|p| p.path.clone()).collect();

        for dir in watched.difference(&current) {
            if let Err(e) = watcher.unwatch(dir) {
                tracing::trace!("Failed to unwatch {}: {}", dir.display(), e);
            }
        }
        for dir in current.difference(&watched) {
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                tracing::warn!("Failed to watch {}: {}", dir.display(), e);
            }
        }
        watched = current;

        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// File names whose change triggers a refresh for a workspace managed by
/// `kind`.
pub fn watched_file_names(kind: PackageManagerKind) -> Vec<&'static str> {
    let mut names = kind.support().watched_files();
    for other in PackageManagerKind::DETECTION_ORDER {
        for lockfile in other.lockfiles() {
            if !names.contains(lockfile) {
                names.push(*lockfile);
            }
        }
    }
    names
}

async fn run_refresh_loop(
    registry: Arc<WorkspaceRegistry>,
    mut rx: mpsc::UnboundedReceiver<WorkspaceEvent>,
) {
    while let Some(WorkspaceEvent::Changed(path)) = rx.recv().await {
        let mut coalesced = 0usize;
        while rx.try_recv().is_ok() {
            coalesced += 1;
        }

        tracing::debug!(
            "Workspace file changed: {} ({} more queued)",
            path.display(),
            coalesced
        );

        let registry = Arc::clone(&registry);
        match tokio::task::spawn_blocking(move || registry.refresh()).await {
            Ok(snapshot) => tracing::info!(
                "Registry refreshed: {} package(s), {} catalog entr(ies)",
                snapshot.packages.len(),
                snapshot.catalogs.len()
            ),
            Err(e) => tracing::error!("Registry refresh panicked: {}", e),
        }
    }

    tracing::debug!("Registry refresh loop stopped");
}
