//! Backup artifacts: self-contained snapshots of the index plus every
//! record envelope.
//!
//! A `.backup` file has this layout:
//!
//! ```text
//! [TVBK: 4 bytes][version: 1 byte][desc_len: 4 bytes LE][descriptor JSON][body]
//! ```
//!
//! The descriptor is plaintext JSON so `list_backups` can show what a
//! backup contains without key material. The body is the snapshot itself
//! (index + record envelopes), run through the same integrity codec as
//! record payloads, keyed by the derived backup key.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, TokenVaultError};
use crate::store::codec::Codec;
use crate::store::index::IndexDocument;

/// Magic bytes at the start of every backup artifact.
const MAGIC: &[u8; 4] = b"TVBK";

/// Current backup artifact format version.
const FORMAT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 4 (desc_len).
const PREFIX_LEN: usize = 9;

/// Extension of backup artifacts inside the backup directory.
const BACKUP_EXT: &str = "backup";

/// Plaintext descriptor stored at the head of each artifact and returned
/// by `backup()` / `list_backups()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDescriptor {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Number of records captured in the snapshot.
    pub token_count: usize,
    /// Base64 SHA-256 digest of the artifact body.
    pub checksum: String,
    pub encrypted: bool,
    pub compressed: bool,
}

/// Snapshot payload serialized into the artifact body.
#[derive(Serialize, Deserialize)]
struct BackupContents {
    index: IndexDocument,
    /// Record id to base64 of the raw on-disk envelope.
    records: HashMap<String, String>,
}

/// Handle to the backup directory.
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the artifact backing `backup_id`.
    pub fn path_for(&self, backup_id: &str) -> PathBuf {
        self.dir.join(format!("{backup_id}.{BACKUP_EXT}"))
    }

    /// Snapshot the index and record envelopes into a fresh artifact.
    ///
    /// `codec` carries the compression flag and backup key matching the
    /// `compressed`/`encrypted` descriptor fields.
    pub fn write(
        &self,
        index: &IndexDocument,
        records: HashMap<String, Vec<u8>>,
        codec: &Codec,
        encrypted: bool,
        compressed: bool,
    ) -> Result<BackupDescriptor> {
        let token_count = index.entries.len();
        let contents = BackupContents {
            index: index.clone(),
            records: records
                .into_iter()
                .map(|(id, bytes)| (id, BASE64.encode(bytes)))
                .collect(),
        };

        let plaintext = serde_json::to_vec(&contents)
            .map_err(|e| TokenVaultError::SerializationError(format!("backup contents: {e}")))?;
        let body = codec.encode(&plaintext)?;

        let descriptor = BackupDescriptor {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            token_count,
            checksum: body.checksum,
            encrypted,
            compressed,
        };

        let desc_bytes = serde_json::to_vec(&descriptor)
            .map_err(|e| TokenVaultError::SerializationError(format!("backup descriptor: {e}")))?;
        let desc_len = u32::try_from(desc_bytes.len()).map_err(|_| {
            TokenVaultError::SerializationError("backup descriptor exceeds u32::MAX".into())
        })?;

        let mut buf = Vec::with_capacity(PREFIX_LEN + desc_bytes.len() + body.bytes.len());
        buf.extend_from_slice(MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&desc_len.to_le_bytes());
        buf.extend_from_slice(&desc_bytes);
        buf.extend_from_slice(&body.bytes);

        // Atomic write, same temp-file + rename dance as the index.
        let path = self.path_for(&descriptor.id);
        let tmp_path = self.dir.join(format!(".{}.tmp", descriptor.id));
        fs::write(&tmp_path, &buf)?;
        fs::rename(&tmp_path, &path)?;

        Ok(descriptor)
    }

    /// Descriptors of every artifact on disk, newest first.
    ///
    /// Unreadable artifacts are skipped with a warning rather than failing
    /// the whole listing.
    pub fn list(&self) -> Result<Vec<BackupDescriptor>> {
        let mut descriptors = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXT) {
                continue;
            }
            match read_descriptor(&path) {
                Ok(desc) => descriptors.push(desc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable backup artifact");
                }
            }
        }

        descriptors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(descriptors)
    }

    /// True if an artifact with this id exists.
    pub fn exists(&self, backup_id: &str) -> bool {
        self.path_for(backup_id).exists()
    }

    /// Load and decode a full snapshot.
    pub fn read_contents(
        &self,
        backup_id: &str,
        codec: &Codec,
    ) -> Result<(BackupDescriptor, IndexDocument, HashMap<String, Vec<u8>>)> {
        let path = self.path_for(backup_id);
        if !path.exists() {
            return Err(TokenVaultError::BackupNotFound(backup_id.to_string()));
        }

        let data = fs::read(&path)?;
        let (descriptor, body) = split_artifact(&data)?;

        let plaintext = codec.decode(body)?;
        let contents: BackupContents = serde_json::from_slice(&plaintext)
            .map_err(|e| TokenVaultError::InvalidBackupFormat(format!("contents JSON: {e}")))?;

        let mut records = HashMap::with_capacity(contents.records.len());
        for (id, encoded) in contents.records {
            let bytes = BASE64.decode(&encoded).map_err(|e| {
                TokenVaultError::InvalidBackupFormat(format!("record '{id}' base64: {e}"))
            })?;
            records.insert(id, bytes);
        }

        Ok((descriptor, contents.index, records))
    }

    /// Delete one artifact.
    pub fn delete(&self, backup_id: &str) -> Result<()> {
        fs::remove_file(self.path_for(backup_id))?;
        Ok(())
    }

    /// Enforce the retention count: delete oldest artifacts until at most
    /// `max` remain. Returns the ids that were pruned.
    pub fn prune(&self, max: usize) -> Result<Vec<String>> {
        let descriptors = self.list()?;
        let mut pruned = Vec::new();

        // `list` is newest-first, so everything past `max` is oldest.
        for desc in descriptors.iter().skip(max) {
            self.delete(&desc.id)?;
            tracing::info!(backup_id = %desc.id, "pruned backup beyond retention count");
            pruned.push(desc.id.clone());
        }

        Ok(pruned)
    }
}

/// Parse the descriptor at the head of an artifact without decoding the body.
fn read_descriptor(path: &Path) -> Result<BackupDescriptor> {
    let data = fs::read(path)?;
    let (descriptor, _) = split_artifact(&data)?;
    Ok(descriptor)
}

/// Split raw artifact bytes into `(descriptor, body)`.
fn split_artifact(data: &[u8]) -> Result<(BackupDescriptor, &[u8])> {
    if data.len() < PREFIX_LEN {
        return Err(TokenVaultError::InvalidBackupFormat(
            "file too small to be a backup artifact".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(TokenVaultError::InvalidBackupFormat(
            "missing TVBK magic bytes".into(),
        ));
    }

    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(TokenVaultError::InvalidBackupFormat(format!(
            "unsupported version {version}, expected {FORMAT_VERSION}"
        )));
    }

    let desc_len = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| TokenVaultError::InvalidBackupFormat("bad descriptor length".into()))?,
    ) as usize;

    let desc_end = PREFIX_LEN + desc_len;
    if desc_end > data.len() {
        return Err(TokenVaultError::InvalidBackupFormat(
            "descriptor length exceeds file size".into(),
        ));
    }

    let descriptor: BackupDescriptor = serde_json::from_slice(&data[PREFIX_LEN..desc_end])
        .map_err(|e| TokenVaultError::InvalidBackupFormat(format!("descriptor JSON: {e}")))?;

    Ok((descriptor, &data[desc_end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::{RecordMetadata, RecordStatus};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    const KEY: [u8; 32] = [0x99u8; 32];

    fn backup_store() -> (TempDir, BackupStore) {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path());
        (dir, store)
    }

    fn sample_index() -> IndexDocument {
        let mut index = IndexDocument::new();
        index.entries.insert(
            "github".into(),
            RecordMetadata {
                tags: BTreeSet::new(),
                created_at: Utc::now(),
                last_accessed: Utc::now(),
                access_count: 0,
                status: RecordStatus::Active,
                size: 7,
                checksum: "abc".into(),
            },
        );
        index
    }

    #[test]
    fn write_and_read_contents_roundtrip() {
        let (_dir, store) = backup_store();
        let codec = Codec::new(true, Some(KEY));

        let mut records = HashMap::new();
        records.insert("github".to_string(), b"envelope".to_vec());

        let desc = store
            .write(&sample_index(), records, &codec, true, true)
            .unwrap();
        assert_eq!(desc.token_count, 1);
        assert!(desc.encrypted);
        assert!(desc.compressed);

        let (loaded_desc, index, records) = store.read_contents(&desc.id, &codec).unwrap();
        assert_eq!(loaded_desc.id, desc.id);
        assert_eq!(index.entries.len(), 1);
        assert_eq!(records["github"], b"envelope");
    }

    #[test]
    fn list_is_newest_first_and_skips_foreign_files() {
        let (dir, store) = backup_store();
        let codec = Codec::new(false, None);

        let first = store
            .write(&sample_index(), HashMap::new(), &codec, false, false)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = store
            .write(&sample_index(), HashMap::new(), &codec, false, false)
            .unwrap();
        fs::write(dir.path().join("README.txt"), b"not a backup").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn prune_deletes_oldest_beyond_max() {
        let (_dir, store) = backup_store();
        let codec = Codec::new(false, None);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let desc = store
                .write(&sample_index(), HashMap::new(), &codec, false, false)
                .unwrap();
            ids.push(desc.id);
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let pruned = store.prune(2).unwrap();
        assert_eq!(pruned.len(), 2);
        // The two oldest are gone, the two newest remain.
        assert!(!store.exists(&ids[0]));
        assert!(!store.exists(&ids[1]));
        assert!(store.exists(&ids[2]));
        assert!(store.exists(&ids[3]));
    }

    #[test]
    fn missing_backup_id_errors() {
        let (_dir, store) = backup_store();
        let codec = Codec::new(false, None);
        assert!(matches!(
            store.read_contents("nope", &codec),
            Err(TokenVaultError::BackupNotFound(_))
        ));
    }

    #[test]
    fn wrong_key_fails_to_decode_encrypted_backup() {
        let (_dir, store) = backup_store();
        let codec = Codec::new(false, Some(KEY));

        let desc = store
            .write(&sample_index(), HashMap::new(), &codec, true, false)
            .unwrap();

        let wrong = Codec::new(false, Some([0x01u8; 32]));
        assert!(store.read_contents(&desc.id, &wrong).is_err());
    }
}
