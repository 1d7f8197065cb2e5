//! The persisted index document.
//!
//! The index is the sole authority for `list`, `search`, `exists`, and
//! statistics; record files are opaque to it. On disk it is an
//! HMAC-sealed envelope:
//!
//! ```text
//! [TVIX: 4 bytes][version: 1 byte][index JSON][HMAC-SHA256: 32 bytes]
//! ```
//!
//! The HMAC is keyed by a sub-key of the master key and verified over the
//! exact bytes read from disk before the JSON is trusted, so index
//! tampering is caught even though the index itself is not encrypted.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::{Result, TokenVaultError};
use crate::store::record::{ListQuery, ListedRecord, RecordMetadata, SearchField};

/// Magic bytes at the start of the index file.
const MAGIC: &[u8; 4] = b"TVIX";

/// Current index file format version.
const FORMAT_VERSION: u8 = 1;

/// Schema version of the index document itself.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Size of the HMAC tag appended to the file (SHA-256 = 32 bytes).
const HMAC_LEN: usize = 32;

/// Fixed-size prefix: 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// The in-memory index: record id to metadata, plus the fragmentation
/// counter that `compact()` resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub version: u32,
    pub entries: HashMap<String, RecordMetadata>,
    /// Bytes freed by removals since the last compaction.
    #[serde(default)]
    pub reclaimable_bytes: u64,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self {
            version: INDEX_SCHEMA_VERSION,
            entries: HashMap::new(),
            reclaimable_bytes: 0,
        }
    }

    /// Total on-disk size of all live records, per the index.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|m| m.size).sum()
    }

    /// Filtered, newest-created-first listing with pagination.
    pub fn list(&self, query: Option<&ListQuery>) -> Vec<ListedRecord> {
        let default_query = ListQuery::default();
        let query = query.unwrap_or(&default_query);

        let mut results: Vec<ListedRecord> = self
            .entries
            .iter()
            .filter(|(id, meta)| {
                if let Some(ids) = &query.ids {
                    if !ids.iter().any(|wanted| wanted == *id) {
                        return false;
                    }
                }
                if let Some(tags) = &query.tags {
                    if !tags.iter().any(|tag| meta.tags.contains(tag)) {
                        return false;
                    }
                }
                if let Some(after) = query.created_after {
                    if meta.created_at < after {
                        return false;
                    }
                }
                true
            })
            .map(|(id, meta)| ListedRecord {
                id: id.clone(),
                metadata: meta.clone(),
            })
            .collect();

        // Newest first; tie-break on id for a deterministic order.
        results.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let paged: Vec<ListedRecord> = results.into_iter().skip(query.offset).collect();
        match query.limit {
            Some(limit) => paged.into_iter().take(limit).collect(),
            None => paged,
        }
    }

    /// Case-insensitive substring match against the requested fields only.
    pub fn search(&self, term: &str, fields: &[SearchField]) -> Vec<ListedRecord> {
        let needle = term.to_lowercase();

        let mut results: Vec<ListedRecord> = self
            .entries
            .iter()
            .filter(|(id, meta)| {
                fields.iter().any(|field| match field {
                    SearchField::Id => id.to_lowercase().contains(&needle),
                    SearchField::Tags => meta
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle)),
                    SearchField::Status => meta.status.as_str().contains(&needle),
                })
            })
            .map(|(id, meta)| ListedRecord {
                id: id.clone(),
                metadata: meta.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        results
    }
}

impl Default for IndexDocument {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Write the index to disk **atomically**.
///
/// Serializes to JSON, seals it with an HMAC, writes to a temp file in the
/// same directory, and renames over the target so readers never observe a
/// half-written index.
pub fn write_index(path: &Path, index: &IndexDocument, hmac_key: &[u8]) -> Result<()> {
    let json_bytes = serde_json::to_vec(index)
        .map_err(|e| TokenVaultError::SerializationError(format!("index: {e}")))?;

    let hmac_tag = compute_hmac(hmac_key, &json_bytes)?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + json_bytes.len() + HMAC_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&json_bytes);
    buf.extend_from_slice(&hmac_tag);

    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, &buf)?;
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Read the index from disk, verifying the HMAC over the raw JSON bytes
/// before deserializing.
pub fn read_index(path: &Path, hmac_key: &[u8]) -> Result<IndexDocument> {
    let data = fs::read(path)?;

    let min_size = PREFIX_LEN + HMAC_LEN;
    if data.len() < min_size {
        return Err(TokenVaultError::InvalidIndexFormat(
            "file too small to be a valid index".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(TokenVaultError::InvalidIndexFormat(
            "missing TVIX magic bytes".into(),
        ));
    }

    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(TokenVaultError::InvalidIndexFormat(format!(
            "unsupported version {version}, expected {FORMAT_VERSION}"
        )));
    }

    let json_end = data.len() - HMAC_LEN;
    let json_bytes = &data[PREFIX_LEN..json_end];
    let stored_hmac = &data[json_end..];

    verify_hmac(hmac_key, json_bytes, stored_hmac)?;

    serde_json::from_slice(json_bytes)
        .map_err(|e| TokenVaultError::InvalidIndexFormat(format!("index JSON: {e}")))
}

/// Compute HMAC-SHA256 over the serialized index bytes.
fn compute_hmac(hmac_key: &[u8], json_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(hmac_key)
        .map_err(|e| TokenVaultError::HmacError(format!("invalid HMAC key: {e}")))?;
    mac.update(json_bytes);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify the stored HMAC using constant-time comparison.
fn verify_hmac(hmac_key: &[u8], json_bytes: &[u8], expected: &[u8]) -> Result<()> {
    let mut mac = Hmac::<Sha256>::new_from_slice(hmac_key)
        .map_err(|e| TokenVaultError::HmacError(format!("invalid HMAC key: {e}")))?;
    mac.update(json_bytes);
    mac.verify_slice(expected)
        .map_err(|_| TokenVaultError::IndexHmacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::RecordStatus;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn meta(age_hours: i64, tags: &[&str]) -> RecordMetadata {
        let created = Utc::now() - Duration::hours(age_hours);
        RecordMetadata {
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            created_at: created,
            last_accessed: created,
            access_count: 0,
            status: RecordStatus::Active,
            size: 100,
            checksum: "abc".into(),
        }
    }

    fn sample_index() -> IndexDocument {
        let mut index = IndexDocument::new();
        index.entries.insert("github".into(), meta(3, &["vcs", "oauth"]));
        index.entries.insert("gitlab".into(), meta(2, &["vcs"]));
        index.entries.insert("slack".into(), meta(1, &["chat"]));
        index
    }

    #[test]
    fn list_orders_newest_first() {
        let index = sample_index();
        let all = index.list(None);
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["slack", "gitlab", "github"]);
    }

    #[test]
    fn list_filters_by_tag_membership() {
        let index = sample_index();
        let query = ListQuery {
            tags: Some(vec!["vcs".into()]),
            ..ListQuery::default()
        };
        let hits = index.list(Some(&query));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.metadata.tags.contains("vcs")));
    }

    #[test]
    fn list_filters_by_explicit_ids_and_paginates() {
        let index = sample_index();
        let query = ListQuery {
            ids: Some(vec!["github".into(), "slack".into()]),
            limit: Some(1),
            offset: 1,
            ..ListQuery::default()
        };
        let hits = index.list(Some(&query));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "github");
    }

    #[test]
    fn list_filters_by_created_after() {
        let index = sample_index();
        let query = ListQuery {
            created_after: Some(Utc::now() - Duration::minutes(90)),
            ..ListQuery::default()
        };
        let hits = index.list(Some(&query));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "slack");
    }

    #[test]
    fn search_only_touches_requested_fields() {
        let index = sample_index();

        // "git" appears in two ids but no tag.
        let by_id = index.search("git", &[SearchField::Id]);
        assert_eq!(by_id.len(), 2);

        let by_tag = index.search("git", &[SearchField::Tags]);
        assert!(by_tag.is_empty());

        let by_status = index.search("active", &[SearchField::Status]);
        assert_eq!(by_status.len(), 3);
    }

    #[test]
    fn persist_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.index");
        let hmac_key = [0x7fu8; 32];

        let index = sample_index();
        write_index(&path, &index, &hmac_key).unwrap();

        let loaded = read_index(&path, &hmac_key).unwrap();
        assert_eq!(loaded.entries.len(), 3);
        assert!(loaded.entries.contains_key("github"));
    }

    #[test]
    fn tampered_index_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.index");
        let hmac_key = [0x7fu8; 32];

        write_index(&path, &sample_index(), &hmac_key).unwrap();

        let mut data = fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        assert!(read_index(&path, &hmac_key).is_err());
    }

    #[test]
    fn wrong_hmac_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.index");

        write_index(&path, &sample_index(), &[0x7fu8; 32]).unwrap();
        assert!(matches!(
            read_index(&path, &[0x80u8; 32]),
            Err(TokenVaultError::IndexHmacMismatch)
        ));
    }
}
