//! Sub-key derivation from the master key using HKDF-SHA256.
//!
//! The engine never uses the raw key material directly. From it we derive:
//! - A unique **per-record** encryption key bound to the record id.
//! - A dedicated **index HMAC key** sealing the persisted index document.
//! - A **backup key** protecting backup artifact bodies.
//!
//! Binding each derived key to a context string means compromising one
//! derived key does not reveal the others.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{Result, TokenVaultError};

/// Length of the master key and all derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

/// A wrapper around the 32-byte master key that zeroes its memory on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Derive the storage-layer encryption key for one record id.
    ///
    /// `info` is `"tokenvault-record:<id>"`, binding the key to the record.
    pub fn derive_record_key(&self, record_id: &str) -> Result<[u8; KEY_LEN]> {
        let info = format!("tokenvault-record:{record_id}");
        hkdf_derive(&self.bytes, info.as_bytes())
    }

    /// Derive the HMAC key used to seal the persisted index document.
    pub fn derive_index_hmac_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, b"tokenvault-index-hmac")
    }

    /// Derive the encryption key for backup artifact bodies.
    pub fn derive_backup_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, b"tokenvault-backup")
    }
}

/// Run HKDF-SHA256 expand with the given `info`.
///
/// The extract step is skipped and the master key is used directly as the
/// pseudo-random key, since the key material is already 32 random bytes.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| TokenVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_differ_per_id() {
        let mk = MasterKey::new([0x42u8; KEY_LEN]);
        let a = mk.derive_record_key("github").unwrap();
        let b = mk.derive_record_key("gitlab").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derivation_is_deterministic() {
        let mk = MasterKey::new([0x42u8; KEY_LEN]);
        assert_eq!(
            mk.derive_record_key("github").unwrap(),
            mk.derive_record_key("github").unwrap()
        );
        assert_eq!(
            mk.derive_index_hmac_key().unwrap(),
            mk.derive_index_hmac_key().unwrap()
        );
    }

    #[test]
    fn contexts_are_independent() {
        let mk = MasterKey::new([0x42u8; KEY_LEN]);
        let index = mk.derive_index_hmac_key().unwrap();
        let backup = mk.derive_backup_key().unwrap();
        assert_ne!(index, backup);
    }
}
