//! Encrypted persisted catalog of sync targets.
//!
//! One file on disk holding an authenticated-encrypted JSON array. Loads and
//! upserts only; the control plane serializes concurrent saves.

mod crypto;
mod store;

pub use store::{Catalog, CatalogError, DEFAULT_STORAGE_FILE, ENCRYPTION_KEY_ENV};
