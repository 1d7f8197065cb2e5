//! tokenvault: a local-first encrypted store for OAuth token blobs.
//!
//! The engine persists each credential as one encrypted file on disk,
//! tracks metadata in an HMAC-sealed index, and supports point-in-time
//! backup/restore plus integrity verification with auto-repair.
//!
//! The store is owned by a single process. Pointing two processes at the
//! same storage directory is undefined behavior; there is no cross-process
//! locking.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod events;
pub mod store;

pub use config::{ConfigPatch, StoreConfig};
pub use errors::{Result, TokenVaultError};
pub use events::{Event, EventKind};
pub use store::TokenStore;
