//! The storage engine: codec, index, record files, backups, and the
//! `TokenStore` facade that ties them together.

pub mod backup;
pub mod codec;
pub mod engine;
pub mod files;
pub mod index;
pub mod maintenance;
pub mod record;

pub use backup::BackupDescriptor;
pub use engine::TokenStore;
pub use record::{
    BatchOp, BatchResult, CleanupReport, CompactReport, HealthStatus, InitSummary,
    IntegrityReport, ListQuery, ListedRecord, RecordMetadata, RecordStatus, RestoreReport,
    Retrieved, SearchField, StoreOptions, StoreReceipt, StoreStats,
};
