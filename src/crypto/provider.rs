//! Key sources injected into the engine at construction.
//!
//! The engine never reaches for a global key: it asks its `KeyProvider`
//! during `initialize()`. Production uses `FileKeyProvider` against
//! `storage.key`; tests can swap in `StaticKeyProvider` to run without
//! touching real key files.

use std::path::PathBuf;

use crate::crypto::keyfile::{generate_key_material, load_key_material};
use crate::crypto::keys::{MasterKey, KEY_LEN};
use crate::errors::Result;

/// A source of master key material.
pub trait KeyProvider: Send + Sync {
    /// Load existing key material, creating it first if none exists.
    fn load_or_create(&self) -> Result<MasterKey>;
}

/// Loads key material from a file on disk, generating it on first use.
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn load_or_create(&self) -> Result<MasterKey> {
        if self.path.exists() {
            load_key_material(&self.path)
        } else {
            generate_key_material(&self.path)
        }
    }
}

/// A fixed in-memory key, for tests and embedding scenarios.
pub struct StaticKeyProvider {
    bytes: [u8; KEY_LEN],
}

impl StaticKeyProvider {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load_or_create(&self) -> Result<MasterKey> {
        Ok(MasterKey::new(self.bytes))
    }
}
