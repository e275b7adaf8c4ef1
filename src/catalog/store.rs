//! Load and upsert of the persisted sync-target list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::crypto::{Cipher, CryptoError};
use crate::model::SyncTarget;

/// Default catalog file name.
pub const DEFAULT_STORAGE_FILE: &str = "synctargets.json.enc";

/// Environment variable carrying the raw catalog encryption key.
pub const ENCRYPTION_KEY_ENV: &str = "GO_ARGO_LITE_ENCRYPTION_KEY";

/// Development-only fallback key (AES-256). Insecure: anyone with the binary
/// can decrypt a catalog written under it.
const INSECURE_DEFAULT_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("encryption key must be 16, 24, or 32 bytes long, got {0} bytes")]
    KeyLength(usize),

    #[error("failed to read catalog file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to decrypt catalog {path}")]
    Decrypt { path: PathBuf },

    #[error("catalog {path} holds invalid JSON: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode catalog payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to encrypt catalog payload")]
    Encrypt,

    #[error("failed to write catalog file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// The encrypted catalog file. Provides load and upsert; does not serialize
/// concurrent upserts, which is the caller's responsibility.
pub struct Catalog {
    path: PathBuf,
    cipher: Cipher,
}

impl Catalog {
    /// Open a catalog at `path` (the default file name when `None`).
    ///
    /// Key priority: explicit bytes, then [`ENCRYPTION_KEY_ENV`], then an
    /// insecure built-in default, with a warning in the last case.
    pub fn open(path: Option<PathBuf>, key: Option<Vec<u8>>) -> Result<Self, CatalogError> {
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_FILE));
        let key = resolve_key(key);
        let cipher = Cipher::new(&key).map_err(|err| match err {
            CryptoError::KeyLength(len) => CatalogError::KeyLength(len),
            _ => CatalogError::Encrypt,
        })?;
        Ok(Self { path, cipher })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, decrypt, and decode the full target list. A missing or empty
    /// file is an empty list, not an error.
    pub fn load(&self) -> Result<Vec<SyncTarget>, CatalogError> {
        let sealed = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "catalog file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(CatalogError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if sealed.is_empty() {
            tracing::debug!(path = %self.path.display(), "catalog file is empty");
            return Ok(Vec::new());
        }

        let plain = self.cipher.open(&sealed).map_err(|_| CatalogError::Decrypt {
            path: self.path.clone(),
        })?;
        serde_json::from_slice(&plain).map_err(|source| CatalogError::Format {
            path: self.path.clone(),
            source,
        })
    }

    /// Insert or replace one target by id, then rewrite the file.
    pub fn upsert(&self, target: SyncTarget) -> Result<(), CatalogError> {
        let mut targets = self.load()?;
        match targets.iter_mut().find(|existing| existing.id == target.id) {
            Some(slot) => *slot = target,
            None => targets.push(target),
        }
        self.save_all(&targets)
    }

    /// Encrypt and atomically persist the full list with owner-only
    /// permissions.
    pub fn save_all(&self, targets: &[SyncTarget]) -> Result<(), CatalogError> {
        let plain = serde_json::to_vec_pretty(targets).map_err(CatalogError::Encode)?;
        let sealed = self.cipher.seal(&plain).map_err(|_| CatalogError::Encrypt)?;
        self.write_atomic(&sealed)?;
        tracing::info!(
            path = %self.path.display(),
            count = targets.len(),
            "catalog saved"
        );
        Ok(())
    }

    fn write_atomic(&self, data: &[u8]) -> Result<(), CatalogError> {
        let write_err = |source: io::Error| CatalogError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        fs::write(temp.path(), data).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        temp.persist(&self.path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

/// Resolve the encryption key: explicit bytes, then environment, then the
/// insecure built-in default.
fn resolve_key(explicit: Option<Vec<u8>>) -> Vec<u8> {
    if let Some(key) = explicit
        && !key.is_empty()
    {
        return key;
    }
    if let Ok(env_key) = std::env::var(ENCRYPTION_KEY_ENV)
        && !env_key.is_empty()
    {
        tracing::info!("catalog encryption key sourced from {ENCRYPTION_KEY_ENV}");
        return env_key.into_bytes();
    }
    tracing::warn!(
        "using built-in catalog encryption key; this is insecure, set {ENCRYPTION_KEY_ENV} \
         for anything beyond development"
    );
    INSECURE_DEFAULT_KEY.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &[u8; 32] = b"an example very very secret key!";

    fn sample_target(id: &str) -> SyncTarget {
        SyncTarget {
            id: id.to_string(),
            repo_url: "https://git.example/x.git".into(),
            repo_branch: "main".into(),
            manifest_path: "k8s".into(),
            poll_interval_seconds: 30,
            cluster_credentials_blob: "apiVersion: v1".into(),
            repo_credentials_blob: String::new(),
        }
    }

    fn open_catalog(dir: &TempDir, key: &[u8]) -> Catalog {
        Catalog::open(
            Some(dir.path().join("synctargets.json.enc")),
            Some(key.to_vec()),
        )
        .expect("open catalog")
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        assert!(catalog.load().expect("load").is_empty());
    }

    #[test]
    fn empty_file_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        fs::write(catalog.path(), b"").expect("touch");
        assert!(catalog.load().expect("load").is_empty());
    }

    #[test]
    fn upsert_then_load_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        catalog.upsert(sample_target("a")).expect("upsert");
        catalog.upsert(sample_target("b")).expect("upsert");

        let loaded = catalog.load().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[1].id, "b");

        let raw = fs::read(catalog.path()).expect("read");
        assert!(!raw.is_empty());
        assert!(
            !raw.windows(4).any(|w| w == b"git.".as_slice()),
            "must not be plaintext"
        );
    }

    #[test]
    fn upsert_replaces_by_id_in_place() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        catalog.upsert(sample_target("a")).expect("upsert");
        catalog.upsert(sample_target("b")).expect("upsert");

        let mut updated = sample_target("a");
        updated.repo_branch = "release".into();
        catalog.upsert(updated).expect("upsert");

        let loaded = catalog.load().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].repo_branch, "release");
        assert_eq!(loaded[1].id, "b");
    }

    #[test]
    fn wrong_key_surfaces_decrypt_error() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        catalog.upsert(sample_target("a")).expect("upsert");

        let other = open_catalog(&dir, b"0123456789abcdef0123456789abcdeX");
        assert!(matches!(other.load(), Err(CatalogError::Decrypt { .. })));
    }

    #[test]
    fn corrupt_json_under_valid_key_surfaces_format_error() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        let sealed = catalog.cipher.seal(b"not json at all").expect("seal");
        fs::write(catalog.path(), sealed).expect("write");
        assert!(matches!(catalog.load(), Err(CatalogError::Format { .. })));
    }

    #[test]
    fn bad_key_length_is_rejected_at_open() {
        let dir = TempDir::new().expect("tempdir");
        let result = Catalog::open(
            Some(dir.path().join("synctargets.json.enc")),
            Some(b"short".to_vec()),
        );
        assert!(matches!(result, Err(CatalogError::KeyLength(5))));
    }

    #[cfg(unix)]
    #[test]
    fn catalog_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let catalog = open_catalog(&dir, KEY);
        catalog.upsert(sample_target("a")).expect("upsert");

        let mode = fs::metadata(catalog.path())
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
