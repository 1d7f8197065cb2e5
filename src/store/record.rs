//! Record metadata and the request/report types of the public surface.
//!
//! A record is one stored credential blob addressed by a caller-supplied
//! id. The payload itself is opaque to the engine; everything the engine
//! knows about a record lives in `RecordMetadata`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a record. Expiry interpretation is caller-defined
/// metadata; the engine only uses it for `cleanup()` retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Expired,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Expired => "expired",
        }
    }
}

/// Everything the index knows about one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Caller-supplied tags for filtering and search.
    pub tags: BTreeSet<String>,

    /// When the record was first stored.
    pub created_at: DateTime<Utc>,

    /// When the record was last retrieved.
    pub last_accessed: DateTime<Utc>,

    /// Number of successful retrievals.
    pub access_count: u64,

    /// Caller-defined lifecycle status.
    pub status: RecordStatus,

    /// Size of the codec-encoded body on disk, in bytes.
    pub size: u64,

    /// Base64 SHA-256 digest of the encoded body.
    pub checksum: String,
}

/// Optional caller-supplied metadata for `store`.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Tags merged into the record's tag set.
    pub tags: Vec<String>,

    /// Initial status; defaults to `Active` when omitted.
    pub status: Option<RecordStatus>,
}

/// Receipt returned by `store` and `update`.
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    pub size: u64,
    pub checksum: String,
}

/// A decoded record returned by `retrieve`.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub data: Value,
    pub metadata: RecordMetadata,
}

/// One entry returned by `list` and `search`.
#[derive(Debug, Clone)]
pub struct ListedRecord {
    pub id: String,
    pub metadata: RecordMetadata,
}

/// Filter and pagination options for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Restrict to this explicit id set.
    pub ids: Option<Vec<String>>,

    /// Keep entries matching **any** of these tags.
    pub tags: Option<Vec<String>>,

    /// Keep entries created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,

    /// Maximum number of entries returned.
    pub limit: Option<usize>,

    /// Number of entries skipped before `limit` applies.
    pub offset: usize,
}

/// Metadata fields that `search` may match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Id,
    Tags,
    Status,
}

/// One operation inside a `batch` call.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Store {
        id: String,
        payload: Value,
        options: Option<StoreOptions>,
    },
    Retrieve {
        id: String,
    },
    Update {
        id: String,
        payload: Value,
    },
    Remove {
        id: String,
        secure: bool,
    },
}

impl BatchOp {
    /// The record id this operation targets.
    pub fn id(&self) -> &str {
        match self {
            BatchOp::Store { id, .. }
            | BatchOp::Retrieve { id }
            | BatchOp::Update { id, .. }
            | BatchOp::Remove { id, .. } => id,
        }
    }
}

/// Outcome of one batch operation. Failures are captured here rather than
/// aborting the batch, so callers can inspect partial results.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub id: String,
    pub ok: bool,
    pub error: Option<String>,
    /// Decoded payload for successful `Retrieve` operations.
    pub data: Option<Value>,
}

/// Summary returned by a successful `initialize()`.
#[derive(Debug, Clone)]
pub struct InitSummary {
    pub schema_version: u32,
    pub encryption_enabled: bool,
    pub records_loaded: usize,
}

/// Report returned by `verify_integrity()`.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub repaired: usize,
}

/// Report returned by `cleanup()`.
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub removed: usize,
    pub reclaimed_bytes: u64,
    pub errors: Vec<String>,
}

/// Report returned by `compact()`.
#[derive(Debug, Clone)]
pub struct CompactReport {
    pub records: usize,
    pub reclaimed_bytes: u64,
}

/// Report returned by `restore()`.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub restored: usize,
    /// Id of the automatic safety backup taken before the restore.
    pub safety_backup_id: String,
}

/// Health classification derived from usage and integrity findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// Aggregate statistics returned by `stats()`.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_records: usize,
    pub total_size: u64,
    /// Bytes freed by removals but not yet compacted away.
    pub reclaimable_bytes: u64,
    /// `reclaimable_bytes` as a fraction of total + reclaimable space.
    pub fragmentation: f64,
    pub backup_count: usize,
    pub health: HealthStatus,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}
