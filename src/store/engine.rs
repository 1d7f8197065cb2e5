//! The `TokenStore` engine.
//!
//! Wires the codec, index, record files, and backup manager together so
//! collaborators (the OAuth and REST layers) can work with simple method
//! calls like `store.store("github", &token_json, None)`.
//!
//! ## Concurrency model
//!
//! - **Per-record-id serialization**: `store`/`update`/`remove`/`retrieve`
//!   hold a per-id lock across their file-write and index-update steps, so
//!   racing mutations of the same id never interleave. Distinct ids
//!   proceed independently.
//! - **Single index writer**: the index lives under one `RwLock`; every
//!   mutating operation serializes its update-and-persist step, while
//!   `list`/`exists`/`search`/`stats` share the read lock.
//! - No cross-process locking: two processes on one storage directory is
//!   undefined behavior.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::config::{ConfigPatch, StoreConfig};
use crate::crypto::keys::{MasterKey, KEY_LEN};
use crate::crypto::provider::{FileKeyProvider, KeyProvider};
use crate::errors::{Result, TokenVaultError};
use crate::events::{Event, EventBus, EventKind};
use crate::store::backup::{BackupDescriptor, BackupStore};
use crate::store::codec::{self, Codec};
use crate::store::files::RecordFiles;
use crate::store::index::{self, IndexDocument, INDEX_SCHEMA_VERSION};
use crate::store::record::{
    BatchOp, BatchResult, InitSummary, ListQuery, ListedRecord, RecordMetadata, RecordStatus,
    RestoreReport, Retrieved, SearchField, StoreOptions, StoreReceipt,
};

/// Mutable engine state, present only between `initialize` and `shutdown`.
pub(crate) struct StoreState {
    pub(crate) master_key: MasterKey,
    /// Cached HKDF sub-key sealing the persisted index.
    pub(crate) index_hmac_key: [u8; KEY_LEN],
    pub(crate) index: IndexDocument,
    /// Error count from the most recent integrity check, feeding `stats`.
    pub(crate) last_integrity_errors: usize,
}

/// The encrypted-at-rest credential store.
pub struct TokenStore {
    pub(crate) config: RwLock<StoreConfig>,
    key_provider: Box<dyn KeyProvider>,
    pub(crate) state: RwLock<Option<StoreState>>,
    /// Per-record-id lock table.
    id_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    pub(crate) events: EventBus,
}

impl TokenStore {
    // ------------------------------------------------------------------
    // Construction and lifecycle
    // ------------------------------------------------------------------

    /// Build an engine with an explicit key source.
    pub fn new(config: StoreConfig, key_provider: Box<dyn KeyProvider>) -> Self {
        Self {
            config: RwLock::new(config),
            key_provider,
            state: RwLock::new(None),
            id_locks: Mutex::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Build an engine keyed by `{storage_dir}/storage.key`.
    pub fn with_defaults(config: StoreConfig) -> Self {
        let provider = FileKeyProvider::new(config.key_path());
        Self::new(config, Box::new(provider))
    }

    /// Prepare the engine: create directories, load or create key
    /// material, load the index. Until this succeeds every other
    /// operation fails fast with `NotInitialized`.
    pub fn initialize(&self) -> Result<InitSummary> {
        let result = self.initialize_inner();
        match result {
            Ok(summary) => {
                self.events.emit(EventKind::Initialized {
                    records_loaded: summary.records_loaded,
                });
                tracing::info!(
                    records = summary.records_loaded,
                    encryption = summary.encryption_enabled,
                    "token store initialized"
                );
                Ok(summary)
            }
            Err(e) => Err(self.report("initialize", None, e)),
        }
    }

    fn initialize_inner(&self) -> Result<InitSummary> {
        let config = self.config.read().clone();

        fs::create_dir_all(&config.storage_dir)?;
        fs::create_dir_all(config.records_dir())?;
        fs::create_dir_all(config.backup_dir())?;

        let master_key = self.key_provider.load_or_create()?;
        let index_hmac_key = master_key.derive_index_hmac_key()?;

        let index_path = config.index_path();
        let index = if index_path.exists() {
            index::read_index(&index_path, &index_hmac_key)?
        } else {
            let index = IndexDocument::new();
            index::write_index(&index_path, &index, &index_hmac_key)?;
            index
        };

        let records_loaded = index.entries.len();
        *self.state.write() = Some(StoreState {
            master_key,
            index_hmac_key,
            index,
            last_integrity_errors: 0,
        });

        Ok(InitSummary {
            schema_version: INDEX_SCHEMA_VERSION,
            encryption_enabled: config.encryption_enabled,
            records_loaded,
        })
    }

    /// Flush the index and mark the engine not-ready. Key material is
    /// zeroized when the state drops. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        let mut guard = self.state.write();
        if let Some(state) = guard.as_ref() {
            let index_path = self.config.read().index_path();
            index::write_index(&index_path, &state.index, &state.index_hmac_key)?;
        }
        *guard = None;
        tracing::info!("token store shut down");
        Ok(())
    }

    /// Register a callback for lifecycle events.
    pub fn subscribe(&self, f: impl Fn(&Event) + Send + Sync + 'static) {
        self.events.subscribe(f);
    }

    // ------------------------------------------------------------------
    // Record operations
    // ------------------------------------------------------------------

    /// Store (or upsert) a credential payload under `id`.
    pub fn store(
        &self,
        id: &str,
        payload: &Value,
        options: Option<StoreOptions>,
    ) -> Result<StoreReceipt> {
        self.store_inner(id, payload, options)
            .map_err(|e| self.report("store", Some(id), e))
    }

    fn store_inner(
        &self,
        id: &str,
        payload: &Value,
        options: Option<StoreOptions>,
    ) -> Result<StoreReceipt> {
        validate_id(id)?;
        if payload.is_null() {
            return Err(TokenVaultError::SerializationError(
                "payload must not be null".into(),
            ));
        }

        // Fail fast before any bytes reach disk. `record_key` only checks
        // readiness when encryption is on, so the check must not hide there.
        {
            let guard = self.state.read();
            guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        }

        let config = self.config.read().clone();
        let record_key = self.record_key(id, config.encryption_enabled)?;

        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| TokenVaultError::SerializationError(format!("payload: {e}")))?;
        let encoded = Codec::new(config.compression_enabled, record_key).encode(&plaintext)?;

        let lock = self.id_lock(id);
        let _guard = lock.lock();

        self.check_budget(id, encoded.size, &config)?;

        RecordFiles::new(config.records_dir()).write(id, &encoded.bytes)?;

        let now = chrono::Utc::now();
        let options = options.unwrap_or_default();
        {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;

            let entry = state
                .index
                .entries
                .entry(id.to_string())
                .or_insert_with(|| RecordMetadata {
                    tags: Default::default(),
                    created_at: now,
                    last_accessed: now,
                    access_count: 0,
                    status: RecordStatus::Active,
                    size: 0,
                    checksum: String::new(),
                });

            entry.tags.extend(options.tags.iter().cloned());
            if let Some(status) = options.status {
                entry.status = status;
            }
            entry.size = encoded.size;
            entry.checksum = encoded.checksum.clone();
            entry.last_accessed = now;

            index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
        }

        self.events.emit(EventKind::Stored {
            id: id.to_string(),
            size: encoded.size,
        });
        tracing::debug!(id, size = encoded.size, "stored record");

        Ok(StoreReceipt {
            size: encoded.size,
            checksum: encoded.checksum,
        })
    }

    /// Retrieve and decode the payload stored under `id`.
    ///
    /// Returns `Ok(None)` when the id is absent from the index. A missing
    /// backing file or a checksum mismatch is `Err(Corruption)`: that is
    /// data loss, not absence, and callers must be able to tell the two
    /// apart.
    pub fn retrieve(&self, id: &str) -> Result<Option<Retrieved>> {
        self.retrieve_inner(id)
            .map_err(|e| self.report("retrieve", Some(id), e))
    }

    fn retrieve_inner(&self, id: &str) -> Result<Option<Retrieved>> {
        validate_id(id)?;
        let config = self.config.read().clone();

        let lock = self.id_lock(id);
        let _guard = lock.lock();

        let expected_checksum = {
            let guard = self.state.read();
            let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
            match state.index.entries.get(id) {
                Some(entry) => entry.checksum.clone(),
                None => return Ok(None),
            }
        };

        let files = RecordFiles::new(config.records_dir());
        if !files.exists(id) {
            return Err(TokenVaultError::Corruption {
                id: id.to_string(),
                detail: "backing file is missing".into(),
            });
        }

        let bytes = files.read(id)?;
        let actual_checksum = codec::verify(&bytes).map_err(|e| TokenVaultError::Corruption {
            id: id.to_string(),
            detail: e.to_string(),
        })?;
        if actual_checksum != expected_checksum {
            return Err(TokenVaultError::Corruption {
                id: id.to_string(),
                detail: "checksum does not match the index".into(),
            });
        }

        // Always derive the key: the envelope flags decide whether it is
        // used, so records written under an older config stay readable.
        let record_key = self.record_key(id, true)?;
        let plaintext = Codec::new(config.compression_enabled, record_key)
            .decode(&bytes)
            .map_err(|e| match e {
                TokenVaultError::Codec(detail) | TokenVaultError::EncryptionFailed(detail) => {
                    TokenVaultError::Corruption {
                        id: id.to_string(),
                        detail,
                    }
                }
                TokenVaultError::DecryptionFailed => TokenVaultError::Corruption {
                    id: id.to_string(),
                    detail: "decryption failed".into(),
                },
                other => other,
            })?;

        let data: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| TokenVaultError::SerializationError(format!("payload: {e}")))?;

        let metadata = {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;
            let entry = state
                .index
                .entries
                .get_mut(id)
                .ok_or_else(|| TokenVaultError::NotFound(id.to_string()))?;
            entry.access_count += 1;
            entry.last_accessed = chrono::Utc::now();
            let metadata = entry.clone();
            index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
            metadata
        };

        self.events.emit(EventKind::Retrieved { id: id.to_string() });
        tracing::debug!(id, "retrieved record");

        Ok(Some(Retrieved { data, metadata }))
    }

    /// Replace the payload of an existing record, preserving its creation
    /// timestamp and tags.
    pub fn update(&self, id: &str, payload: &Value) -> Result<StoreReceipt> {
        self.update_inner(id, payload)
            .map_err(|e| self.report("update", Some(id), e))
    }

    fn update_inner(&self, id: &str, payload: &Value) -> Result<StoreReceipt> {
        validate_id(id)?;
        if payload.is_null() {
            return Err(TokenVaultError::SerializationError(
                "payload must not be null".into(),
            ));
        }

        let config = self.config.read().clone();

        {
            let guard = self.state.read();
            let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
            if !state.index.entries.contains_key(id) {
                return Err(TokenVaultError::NotFound(id.to_string()));
            }
        }

        let record_key = self.record_key(id, config.encryption_enabled)?;
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| TokenVaultError::SerializationError(format!("payload: {e}")))?;
        let encoded = Codec::new(config.compression_enabled, record_key).encode(&plaintext)?;

        let lock = self.id_lock(id);
        let _guard = lock.lock();

        self.check_budget(id, encoded.size, &config)?;

        RecordFiles::new(config.records_dir()).write(id, &encoded.bytes)?;

        {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;
            let entry = state
                .index
                .entries
                .get_mut(id)
                .ok_or_else(|| TokenVaultError::NotFound(id.to_string()))?;
            entry.size = encoded.size;
            entry.checksum = encoded.checksum.clone();
            entry.last_accessed = chrono::Utc::now();
            index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
        }

        self.events.emit(EventKind::Updated {
            id: id.to_string(),
            size: encoded.size,
        });
        tracing::debug!(id, size = encoded.size, "updated record");

        Ok(StoreReceipt {
            size: encoded.size,
            checksum: encoded.checksum,
        })
    }

    /// Remove a record. With `secure` set the file content is overwritten
    /// with random bytes before the unlink.
    pub fn remove(&self, id: &str, secure: bool) -> Result<()> {
        self.remove_inner(id, secure)
            .map_err(|e| self.report("remove", Some(id), e))
    }

    fn remove_inner(&self, id: &str, secure: bool) -> Result<()> {
        validate_id(id)?;
        let config = self.config.read().clone();

        let lock = self.id_lock(id);
        let _guard = lock.lock();

        {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;
            let size = state
                .index
                .entries
                .get(id)
                .map(|entry| entry.size)
                .ok_or_else(|| TokenVaultError::NotFound(id.to_string()))?;

            let files = RecordFiles::new(config.records_dir());
            if files.exists(id) {
                files.delete(id, secure)?;
            }

            state.index.entries.remove(id);
            state.index.reclaimable_bytes += size;
            index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
        }

        self.events.emit(EventKind::Removed {
            id: id.to_string(),
            secure,
        });
        tracing::debug!(id, secure, "removed record");
        Ok(())
    }

    /// True only if the index knows `id` **and** its backing file is on
    /// disk. A dangling index entry reports false.
    pub fn exists(&self, id: &str) -> Result<bool> {
        self.exists_inner(id)
            .map_err(|e| self.report("exists", Some(id), e))
    }

    fn exists_inner(&self, id: &str) -> Result<bool> {
        let config = self.config.read().clone();
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;

        if !state.index.entries.contains_key(id) {
            return Ok(false);
        }
        Ok(RecordFiles::new(config.records_dir()).exists(id))
    }

    /// Filtered, newest-first listing of record metadata.
    pub fn list(&self, query: Option<&ListQuery>) -> Result<Vec<ListedRecord>> {
        self.list_inner(query)
            .map_err(|e| self.report("list", None, e))
    }

    fn list_inner(&self, query: Option<&ListQuery>) -> Result<Vec<ListedRecord>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        Ok(state.index.list(query))
    }

    /// Substring search over the requested metadata fields.
    pub fn search(&self, term: &str, fields: &[SearchField]) -> Result<Vec<ListedRecord>> {
        self.search_inner(term, fields)
            .map_err(|e| self.report("search", None, e))
    }

    fn search_inner(&self, term: &str, fields: &[SearchField]) -> Result<Vec<ListedRecord>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        Ok(state.index.search(term, fields))
    }

    // ------------------------------------------------------------------
    // Batch
    // ------------------------------------------------------------------

    /// Execute a best-effort sequence of operations.
    ///
    /// One result per operation, in order; a failing operation never
    /// aborts the rest. This is not a transaction.
    pub fn batch(&self, ops: &[BatchOp]) -> Result<Vec<BatchResult>> {
        {
            let guard = self.state.read();
            guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        }

        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let id = op.id().to_string();
            let outcome = match op {
                BatchOp::Store {
                    id,
                    payload,
                    options,
                } => self
                    .store(id, payload, options.clone())
                    .map(|_| None)
                    .map_err(|e| e.to_string()),
                BatchOp::Retrieve { id } => match self.retrieve(id) {
                    Ok(Some(found)) => Ok(Some(found.data)),
                    Ok(None) => Err(TokenVaultError::NotFound(id.clone()).to_string()),
                    Err(e) => Err(e.to_string()),
                },
                BatchOp::Update { id, payload } => self
                    .update(id, payload)
                    .map(|_| None)
                    .map_err(|e| e.to_string()),
                BatchOp::Remove { id, secure } => self
                    .remove(id, *secure)
                    .map(|_| None)
                    .map_err(|e| e.to_string()),
            };

            results.push(match outcome {
                Ok(data) => BatchResult {
                    id,
                    ok: true,
                    error: None,
                    data,
                },
                Err(message) => BatchResult {
                    id,
                    ok: false,
                    error: Some(message),
                    data: None,
                },
            });
        }

        Ok(results)
    }

    // ------------------------------------------------------------------
    // Backup and restore
    // ------------------------------------------------------------------

    /// Snapshot the index and every live record into one artifact, then
    /// enforce the retention count.
    pub fn backup(&self, compress: bool) -> Result<BackupDescriptor> {
        self.backup_inner(compress)
            .map_err(|e| self.report("backup", None, e))
    }

    fn backup_inner(&self, compress: bool) -> Result<BackupDescriptor> {
        let config = self.config.read().clone();
        let descriptor = self.snapshot(&config, compress)?;

        let backups = BackupStore::new(config.backup_dir());
        backups.prune(config.max_backup_files.max(1))?;

        self.events.emit(EventKind::BackupCreated {
            backup_id: descriptor.id.clone(),
            token_count: descriptor.token_count,
        });
        tracing::info!(
            backup_id = %descriptor.id,
            tokens = descriptor.token_count,
            "backup created"
        );
        Ok(descriptor)
    }

    /// Take a snapshot without retention or events. Shared by `backup`
    /// and the safety backup inside `restore`.
    fn snapshot(&self, config: &StoreConfig, compress: bool) -> Result<BackupDescriptor> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;

        let files = RecordFiles::new(config.records_dir());
        let mut snapshot_index = state.index.clone();
        let mut records = HashMap::new();
        let mut missing = Vec::new();

        for id in state.index.entries.keys() {
            if files.exists(id) {
                records.insert(id.clone(), files.read(id)?);
            } else {
                // A dangling entry cannot be snapshotted; leave it to
                // verify_integrity and keep the artifact self-consistent.
                tracing::warn!(id, "skipping dangling index entry during backup");
                missing.push(id.clone());
            }
        }
        for id in &missing {
            snapshot_index.entries.remove(id);
        }

        let backup_key = if config.encryption_enabled {
            Some(state.master_key.derive_backup_key()?)
        } else {
            None
        };
        let encrypted = backup_key.is_some();
        let codec = Codec::new(compress, backup_key);

        BackupStore::new(config.backup_dir()).write(
            &snapshot_index,
            records,
            &codec,
            encrypted,
            compress,
        )
    }

    /// Descriptors of all retained backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupDescriptor>> {
        self.list_backups_inner()
            .map_err(|e| self.report("list_backups", None, e))
    }

    fn list_backups_inner(&self) -> Result<Vec<BackupDescriptor>> {
        {
            let guard = self.state.read();
            guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        }
        let config = self.config.read().clone();
        BackupStore::new(config.backup_dir()).list()
    }

    /// Replace the current index and record files with a backup's
    /// contents.
    ///
    /// A safety backup of the current state is taken first, so a bad
    /// restore can itself be undone. Records created after the snapshot
    /// are destroyed.
    pub fn restore(&self, backup_id: &str) -> Result<RestoreReport> {
        self.restore_inner(backup_id)
            .map_err(|e| self.report("restore", Some(backup_id), e))
    }

    fn restore_inner(&self, backup_id: &str) -> Result<RestoreReport> {
        let config = self.config.read().clone();
        let backups = BackupStore::new(config.backup_dir());
        if !backups.exists(backup_id) {
            return Err(TokenVaultError::BackupNotFound(backup_id.to_string()));
        }

        // Decode the artifact before touching anything. The codec follows
        // the envelope flags, so the key is passed unconditionally.
        let backup_key = {
            let guard = self.state.read();
            let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
            Some(state.master_key.derive_backup_key()?)
        };
        let codec = Codec::new(config.compression_enabled, backup_key);
        let (_descriptor, snapshot_index, snapshot_records) =
            backups.read_contents(backup_id, &codec)?;

        // Safety net: snapshot the current state before overwriting it.
        let safety = self.snapshot(&config, true)?;

        let restored = {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;
            let files = RecordFiles::new(config.records_dir());

            for id in files.scan_ids()? {
                files.delete(&id, false)?;
            }
            for (id, bytes) in &snapshot_records {
                files.write(id, bytes)?;
            }

            state.index = snapshot_index;
            state.index.reclaimable_bytes = 0;
            index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
            snapshot_records.len()
        };

        self.events.emit(EventKind::BackupRestored {
            backup_id: backup_id.to_string(),
            restored,
        });
        tracing::info!(backup_id, restored, safety_backup = %safety.id, "backup restored");

        Ok(RestoreReport {
            restored,
            safety_backup_id: safety.id,
        })
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Defensive copy of the current configuration.
    pub fn config(&self) -> StoreConfig {
        self.config.read().clone()
    }

    /// Merge a partial config update at runtime. No re-initialization is
    /// required; the next operation sees the merged values.
    pub fn update_config(&self, patch: ConfigPatch) {
        self.config.write().apply(patch);
        tracing::debug!("configuration updated");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Reject a write whose envelope would push live usage past the
    /// configured budget. A budget of zero disables the check.
    ///
    /// Called under the id lock, so the replaced entry's size is stable.
    fn check_budget(&self, id: &str, incoming: u64, config: &StoreConfig) -> Result<()> {
        if config.max_storage_size == 0 {
            return Ok(());
        }
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        let replaced = state.index.entries.get(id).map(|e| e.size).unwrap_or(0);
        let used = state.index.total_size() - replaced + incoming;
        if used > config.max_storage_size {
            return Err(TokenVaultError::StorageFull {
                used,
                limit: config.max_storage_size,
            });
        }
        Ok(())
    }

    /// The per-id mutex, created on first use.
    fn id_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut table = self.id_locks.lock();
        Arc::clone(table.entry(id.to_string()).or_default())
    }

    /// Derive the storage-layer key for `id`, or `None` when encryption
    /// is off for writes.
    fn record_key(&self, id: &str, wanted: bool) -> Result<Option<[u8; KEY_LEN]>> {
        if !wanted {
            return Ok(None);
        }
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;
        Ok(Some(state.master_key.derive_record_key(id)?))
    }

    /// Emit an `Error` event and pass the error through.
    pub(crate) fn report(
        &self,
        operation: &str,
        id: Option<&str>,
        err: TokenVaultError,
    ) -> TokenVaultError {
        tracing::warn!(operation, id, error = %err, "operation failed");
        self.events.emit(EventKind::Error {
            operation: operation.to_string(),
            id: id.map(str::to_string),
            message: err.to_string(),
        });
        err
    }
}

/// Validate that a record id is safe to embed in a filename.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
/// Must be non-empty and at most 256 characters.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TokenVaultError::InvalidId("id cannot be empty".into()));
    }
    if id.len() > 256 {
        return Err(TokenVaultError::InvalidId(
            "id cannot exceed 256 characters".into(),
        ));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(TokenVaultError::InvalidId(format!(
            "id '{id}' contains invalid characters; only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}
