//! Per-target reconciliation loop.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam::channel::{Receiver, TryRecvError, tick};
use tokio::runtime::Handle;

use super::registry::Registry;
use crate::cluster::{Applier, ClusterAccess};
use crate::git::Worktree;
use crate::model::SyncTarget;
use crate::paths;

/// Whether a reconcile pass ran to completion or observed stop.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pass {
    Completed,
    Stopped,
}

/// Drive one target until stopped: build the applier and worktree, reconcile
/// once at startup, then reconcile on every tick.
///
/// Construction failures abandon the target: logged, deregistered, done. The
/// catalog entry stays behind and is retried at the next process start.
pub(crate) fn run(
    target: SyncTarget,
    repos_dir: PathBuf,
    runtime: Handle,
    registry: Registry,
    stop: Receiver<()>,
) {
    let id = target.id.clone();

    let access = ClusterAccess::resolve(Some(target.cluster_credentials_blob.as_str()), None);
    let applier = match Applier::connect(runtime, &access) {
        Ok(applier) => applier,
        Err(error) => {
            tracing::error!(id = %id, %error, "cluster client construction failed, abandoning target");
            let _ = registry.deregister(&id);
            return;
        }
    };

    let mut worktree = Worktree::new(
        paths::worktree_dir(&repos_dir, &id),
        target.repo_url.clone(),
        target.repo_branch.clone(),
        target.manifest_path.clone(),
    );
    if let Err(error) = worktree.init() {
        tracing::error!(id = %id, %error, "worktree initialization failed, abandoning target");
        let _ = registry.deregister(&id);
        return;
    }

    let mut last_hash: Option<String> = None;

    if reconcile(&id, &worktree, &applier, &mut last_hash, &stop) == Pass::Stopped {
        finish(&id, worktree);
        return;
    }

    let interval = Duration::from_secs(target.poll_interval_seconds.max(1));
    let ticker = tick(interval);
    tracing::info!(id = %id, interval_secs = interval.as_secs(), "supervising");

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                if reconcile(&id, &worktree, &applier, &mut last_hash, &stop) == Pass::Stopped {
                    break;
                }
            }
            recv(stop) -> _ => break,
        }
    }
    finish(&id, worktree);
}

/// One fetch → hash-compare → apply pass.
///
/// The new hash is recorded as soon as a change is detected; listing and
/// apply failures never roll it back, so a persistently-broken commit is not
/// re-applied on every tick. Stop is honored between manifest files, never
/// mid-file.
pub(crate) fn reconcile(
    id: &str,
    worktree: &Worktree,
    applier: &Applier,
    last_hash: &mut Option<String>,
    stop: &Receiver<()>,
) -> Pass {
    if let Err(error) = worktree.fetch_and_reset() {
        tracing::warn!(id = %id, %error, "fetch failed, will retry next tick");
        return Pass::Completed;
    }

    let hash = match worktree.head_hash() {
        Ok(hash) => hash,
        Err(error) => {
            tracing::warn!(id = %id, %error, "commit hash lookup failed");
            return Pass::Completed;
        }
    };

    if last_hash.as_deref() == Some(hash.as_str()) {
        tracing::debug!(id = %id, commit = %hash, "no change");
        return Pass::Completed;
    }
    match last_hash.replace(hash.clone()) {
        Some(previous) => {
            tracing::info!(id = %id, old = %previous, new = %hash, "new commit detected");
        }
        None => tracing::info!(id = %id, commit = %hash, "initial commit observed"),
    }

    let files = match worktree.manifest_files() {
        Ok(files) => files,
        Err(error) => {
            tracing::warn!(id = %id, %error, "manifest listing failed");
            return Pass::Completed;
        }
    };

    tracing::info!(id = %id, commit = %hash, files = files.len(), "applying manifests");
    for file in files {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => {
                tracing::info!(id = %id, "stop observed during apply pass");
                return Pass::Stopped;
            }
        }
        match applier.apply_file(&file) {
            Ok(()) => tracing::info!(id = %id, file = %file.display(), "manifest applied"),
            Err(error) => {
                tracing::warn!(id = %id, file = %file.display(), %error, "manifest apply failed");
            }
        }
    }
    Pass::Completed
}

fn finish(id: &str, worktree: Worktree) {
    tracing::info!(id = %id, "stopping, removing worktree");
    if let Err(error) = worktree.destroy() {
        tracing::warn!(id = %id, %error, "worktree cleanup failed");
    }
}
