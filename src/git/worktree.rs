//! Per-target working copy management.
//!
//! Owns `git2::Repository` handles, which are `!Send`/`!Sync`: a `Worktree`
//! lives on its supervisor thread and nothing else touches its directory.

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{BranchType, FetchOptions, RemoteCallbacks, Repository, ResetType};

use super::error::RepoError;

/// The on-disk clone for exactly one `(repo_url, branch, manifest_path)`
/// assignment over its lifetime.
pub struct Worktree {
    path: PathBuf,
    url: String,
    branch: String,
    manifest_path: String,
    repo: Option<Repository>,
}

impl Worktree {
    pub fn new(
        path: PathBuf,
        url: impl Into<String>,
        branch: impl Into<String>,
        manifest_path: impl Into<String>,
    ) -> Self {
        Self {
            path,
            url: url.into(),
            branch: branch.into(),
            manifest_path: manifest_path.into(),
            repo: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone (single-branch) or open the working copy, then make sure the
    /// tracked branch is checked out.
    ///
    /// An existing repository is opened without validating that its remote
    /// matches `url`; the id-derived directory mapping guarantees distinct
    /// targets never share a path.
    pub fn init(&mut self) -> Result<(), RepoError> {
        let repo = if self.path.join(".git").exists() {
            tracing::info!(path = %self.path.display(), "opening existing repository");
            Repository::open(&self.path).map_err(|source| RepoError::Open {
                path: self.path.clone(),
                source,
            })?
        } else {
            tracing::info!(
                url = %self.url,
                path = %self.path.display(),
                branch = %self.branch,
                "cloning repository"
            );
            let mut fetch = FetchOptions::new();
            fetch.remote_callbacks(ambient_credentials(None));
            RepoBuilder::new()
                .branch(&self.branch)
                .fetch_options(fetch)
                .clone(&self.url, &self.path)
                .map_err(|source| RepoError::Clone {
                    url: self.url.clone(),
                    path: self.path.clone(),
                    source,
                })?
        };
        self.repo = Some(repo);
        self.checkout_branch()
    }

    /// Force-fetch the tracked branch and hard-reset the working tree to the
    /// remote tip. An already-up-to-date fetch is success.
    pub fn fetch_and_reset(&self) -> Result<(), RepoError> {
        let repo = self.repo()?;
        let branch = &self.branch;
        let fetch_err = |source: git2::Error| RepoError::Fetch {
            branch: branch.clone(),
            source,
        };

        let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
        let mut remote = repo.find_remote("origin").map_err(fetch_err)?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(ambient_credentials(repo.config().ok()));
        remote
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(fetch_err)?;
        drop(remote);

        let remote_ref = format!("refs/remotes/origin/{branch}");
        let target = repo
            .refname_to_id(&remote_ref)
            .map_err(|source| RepoError::Reference {
                reference: remote_ref.clone(),
                source,
            })?;
        let object = repo
            .find_object(target, None)
            .map_err(|source| RepoError::Reference {
                reference: remote_ref.clone(),
                source,
            })?;
        tracing::debug!(branch = %branch, commit = %target, "resetting worktree to remote tip");
        repo.reset(&object, ResetType::Hard, None)
            .map_err(|source| RepoError::Reset {
                reference: remote_ref,
                source,
            })?;

        self.checkout_branch()
    }

    /// Commit hash of HEAD as a hex string.
    pub fn head_hash(&self) -> Result<String, RepoError> {
        let repo = self.repo()?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(RepoError::Head)?;
        Ok(commit.id().to_string())
    }

    /// Every regular file under `<path>/<manifest_path>` whose extension is
    /// exactly `yaml` or `yml`, sorted lexicographically so apply order is
    /// deterministic. An extant empty directory yields an empty list.
    pub fn manifest_files(&self) -> Result<Vec<PathBuf>, RepoError> {
        self.repo()?;
        let dir = self.path.join(&self.manifest_path);
        if !dir.is_dir() {
            return Err(RepoError::ManifestPathMissing { path: dir });
        }
        let mut files = Vec::new();
        collect_manifests(&dir, &mut files).map_err(|source| RepoError::Walk {
            path: dir,
            source,
        })?;
        files.sort();
        Ok(files)
    }

    /// Remove the working copy from disk. Best-effort: the caller logs
    /// failures.
    pub fn destroy(self) -> std::io::Result<()> {
        let Worktree { path, repo, .. } = self;
        drop(repo);
        fs::remove_dir_all(&path)
    }

    fn repo(&self) -> Result<&Repository, RepoError> {
        self.repo.as_ref().ok_or(RepoError::NotInitialized)
    }

    /// Force-checkout the tracked branch, materializing the local ref from
    /// `origin/<branch>` when it does not exist yet.
    fn checkout_branch(&self) -> Result<(), RepoError> {
        let repo = self.repo()?;
        let branch = &self.branch;
        let checkout_err = |source: git2::Error| RepoError::Checkout {
            branch: branch.clone(),
            source,
        };

        if repo.find_branch(branch, BranchType::Local).is_err() {
            let remote_ref = format!("refs/remotes/origin/{branch}");
            let commit = repo
                .find_reference(&remote_ref)
                .and_then(|reference| reference.peel_to_commit())
                .map_err(|source| RepoError::BranchLookup {
                    branch: branch.clone(),
                    source,
                })?;
            tracing::debug!(branch = %branch, from = %remote_ref, "materializing local branch");
            repo.branch(branch, &commit, true).map_err(checkout_err)?;
        }

        repo.set_head(&format!("refs/heads/{branch}"))
            .map_err(checkout_err)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout)).map_err(checkout_err)
    }
}

/// Ambient credential chain: ssh-agent for ssh remotes, the configured git
/// credential helper for http(s), anonymous default otherwise. Target-carried
/// repository credentials are reserved and never consulted.
fn ambient_credentials(config: Option<git2::Config>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        if allowed.is_ssh_key()
            && let Some(user) = username_from_url
        {
            return git2::Cred::ssh_key_from_agent(user);
        }
        if allowed.is_user_pass_plaintext()
            && let Some(ref config) = config
            && let Ok(cred) = git2::Cred::credential_helper(config, url, username_from_url)
        {
            return Ok(cred);
        }
        git2::Cred::default()
    });
    callbacks
}

fn collect_manifests(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_manifests(&path, out)?;
        } else if file_type.is_file() && is_manifest(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}
