//! Key material files.
//!
//! `storage.key` holds 32 random bytes generated once at first
//! initialization and loaded on every subsequent one. The file is written
//! with owner-only permissions and its length is validated on load, so a
//! truncated or padded key file fails loudly instead of decrypting garbage.

use std::fs;
use std::path::Path;

use rand::RngCore;

use crate::crypto::keys::{MasterKey, KEY_LEN};
use crate::errors::{Result, TokenVaultError};

/// Generate fresh key material and write it to `path`.
///
/// Fails if a key file already exists: overwriting it would orphan every
/// record encrypted under the old key.
pub fn generate_key_material(path: &Path) -> Result<MasterKey> {
    if path.exists() {
        return Err(TokenVaultError::KeyMaterial(format!(
            "key material already exists at {}",
            path.display()
        )));
    }

    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut bytes);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                TokenVaultError::KeyMaterial(format!("cannot create key directory: {e}"))
            })?;
        }
    }

    fs::write(path, bytes)
        .map_err(|e| TokenVaultError::KeyMaterial(format!("failed to write key file: {e}")))?;

    // On Unix, restrict permissions to owner-only read/write.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(|e| {
            TokenVaultError::KeyMaterial(format!("failed to set key file permissions: {e}"))
        })?;
    }

    Ok(MasterKey::new(bytes))
}

/// Load key material from disk, validating its length.
pub fn load_key_material(path: &Path) -> Result<MasterKey> {
    if !path.exists() {
        return Err(TokenVaultError::KeyMaterial(format!(
            "key material not found at {}",
            path.display()
        )));
    }

    let data = fs::read(path)
        .map_err(|e| TokenVaultError::KeyMaterial(format!("failed to read key file: {e}")))?;

    if data.len() != KEY_LEN {
        return Err(TokenVaultError::KeyMaterial(format!(
            "key file must be exactly {} bytes, got {}",
            KEY_LEN,
            data.len()
        )));
    }

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&data);
    Ok(MasterKey::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.key");

        let generated = generate_key_material(&path).unwrap();
        let loaded = load_key_material(&path).unwrap();

        // Same key material derives the same sub-keys.
        assert_eq!(
            generated.derive_index_hmac_key().unwrap(),
            loaded.derive_index_hmac_key().unwrap()
        );
    }

    #[test]
    fn generate_fails_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.key");

        generate_key_material(&path).unwrap();
        assert!(generate_key_material(&path).is_err());
    }

    #[test]
    fn load_fails_if_missing() {
        let dir = TempDir::new().unwrap();
        assert!(load_key_material(&dir.path().join("nope.key")).is_err());
    }

    #[test]
    fn load_fails_on_wrong_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.key");
        fs::write(&path, [0u8; 16]).unwrap();

        assert!(load_key_material(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.key");
        generate_key_material(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
