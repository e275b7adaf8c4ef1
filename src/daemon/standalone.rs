//! Single-target mode driven entirely by environment variables.
//!
//! No control plane, catalog, or registry: one worktree, one applier, one
//! reconcile loop until interrupted. The clone directory is user-chosen and
//! kept on exit.

use crossbeam::channel::tick;

use super::shutdown_channel;
use super::supervisor::{self, Pass};
use crate::cluster::{Applier, ClusterAccess};
use crate::config::StandaloneConfig;
use crate::git::Worktree;

const TARGET_LABEL: &str = "standalone";

pub fn run_standalone(config: StandaloneConfig) -> crate::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let access = ClusterAccess::resolve(None, config.kubeconfig_path.as_deref());
    let applier = Applier::connect(runtime.handle().clone(), &access)?;

    let mut worktree = Worktree::new(
        config.clone_path.clone(),
        config.repo_url.clone(),
        config.repo_branch.clone(),
        config.manifest_path.clone(),
    );
    worktree.init()?;

    let stop = shutdown_channel()?;
    let mut last_hash = None;

    if supervisor::reconcile(TARGET_LABEL, &worktree, &applier, &mut last_hash, &stop)
        == Pass::Stopped
    {
        return Ok(());
    }

    let ticker = tick(config.poll_interval);
    tracing::info!(
        url = %config.repo_url,
        branch = %config.repo_branch,
        interval_secs = config.poll_interval.as_secs(),
        "watching repository"
    );

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                if supervisor::reconcile(TARGET_LABEL, &worktree, &applier, &mut last_hash, &stop)
                    == Pass::Stopped
                {
                    break;
                }
            }
            recv(stop) -> _ => break,
        }
    }
    tracing::info!("shutdown signal received");
    Ok(())
}
