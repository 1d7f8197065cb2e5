use thiserror::Error;

/// All errors that can occur in tokenvault.
#[derive(Debug, Error)]
pub enum TokenVaultError {
    // --- Lifecycle errors ---
    #[error("Store not initialized: call initialize() before any other operation")]
    NotInitialized,

    // --- Record errors ---
    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Invalid record id: {0}")]
    InvalidId(String),

    #[error("Corruption detected for record '{id}': {detail}")]
    Corruption { id: String, detail: String },

    // --- Backup errors ---
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Backup '{0}' not found")]
    BackupNotFound(String),

    #[error("Invalid backup artifact: {0}")]
    InvalidBackupFormat(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key material or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Key material error: {0}")]
    KeyMaterial(String),

    // --- Index errors ---
    #[error("Invalid index format: {0}")]
    InvalidIndexFormat(String),

    #[error("Index HMAC verification failed: index file may be tampered")]
    IndexHmacMismatch,

    #[error("HMAC error: {0}")]
    HmacError(String),

    // --- Capacity errors ---
    #[error("Storage full: {used} of {limit} bytes used")]
    StorageFull { used: u64, limit: u64 },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience type alias for tokenvault results.
pub type Result<T> = std::result::Result<T, TokenVaultError>;
