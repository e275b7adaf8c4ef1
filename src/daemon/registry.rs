//! In-memory index of currently-managed targets.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use thiserror::Error;
use tokio::runtime::Handle;

use super::supervisor;
use crate::model::SyncTarget;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("target ID '{0}' already managed")]
    DuplicateTarget(String),

    #[error("failed to spawn supervisor thread for target {id}: {source}")]
    Spawn { id: String, source: std::io::Error },
}

/// One registered target: snapshot, stop signal, supervisor join handle.
pub struct ManagedTarget {
    pub target: SyncTarget,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

/// Registry of live targets, keyed by target id. Cheap to clone; every clone
/// shares the same index.
///
/// Every mutation and lookup goes through the internal lock; the lock is
/// never held while spawning or joining supervisor threads.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    targets: Mutex<HashMap<String, ManagedTarget>>,
    repos_dir: PathBuf,
    runtime: Handle,
}

impl Registry {
    pub fn new(repos_dir: PathBuf, runtime: Handle) -> Self {
        if let Err(error) = std::fs::create_dir_all(&repos_dir) {
            tracing::warn!(
                dir = %repos_dir.display(),
                %error,
                "could not create base repository directory"
            );
        }
        Self {
            inner: Arc::new(RegistryInner {
                targets: Mutex::new(HashMap::new()),
                repos_dir,
                runtime,
            }),
        }
    }

    /// Install the target and spawn its supervisor.
    pub fn register(&self, target: SyncTarget) -> Result<(), RegistryError> {
        let id = target.id.clone();
        let (stop_tx, stop_rx) = channel::bounded(1);

        {
            let mut targets = self.lock();
            if targets.contains_key(&id) {
                return Err(RegistryError::DuplicateTarget(id));
            }
            targets.insert(
                id.clone(),
                ManagedTarget {
                    target: target.clone(),
                    stop_tx,
                    thread: None,
                },
            );
        }

        tracing::info!(
            id = %id,
            url = %target.repo_url,
            branch = %target.repo_branch,
            path = %target.manifest_path,
            "starting supervisor"
        );
        let registry = self.clone();
        let repos_dir = self.inner.repos_dir.clone();
        let runtime = self.inner.runtime.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("sync-{id}"))
            .spawn(move || supervisor::run(target, repos_dir, runtime, registry, stop_rx));

        match spawned {
            Ok(handle) => {
                // The supervisor may already have deregistered itself; only
                // stash the handle while the entry is still present.
                if let Some(entry) = self.lock().get_mut(&id) {
                    entry.thread = Some(handle);
                }
                Ok(())
            }
            Err(source) => {
                let _ = self.lock().remove(&id);
                Err(RegistryError::Spawn { id, source })
            }
        }
    }

    /// Remove a target's record. Reserved for a future unregister surface;
    /// supervisors use it on their initialization failure paths.
    pub fn deregister(&self, id: &str) -> Option<ManagedTarget> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Snapshot of managed ids, for internal inspection.
    pub fn managed_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Signal every supervisor to stop, then join them all.
    pub fn stop_all(&self) {
        let drained: Vec<ManagedTarget> = {
            let mut targets = self.lock();
            targets.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            let _ = entry.stop_tx.send(());
        }
        for entry in drained {
            if let Some(handle) = entry.thread
                && handle.join().is_err()
            {
                tracing::error!(id = %entry.target.id, "supervisor thread panicked");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ManagedTarget>> {
        self.inner
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
