//! Cryptographic primitives for the storage layer.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - HKDF-based sub-key derivation from the master key (`keys`)
//! - Fixed-length key material files (`keyfile`)
//! - The `KeyProvider` seam that injects key material into the engine
//!   (`provider`)

pub mod encryption;
pub mod keyfile;
pub mod keys;
pub mod provider;

pub use encryption::{decrypt, encrypt};
pub use keyfile::{generate_key_material, load_key_material};
pub use keys::MasterKey;
pub use provider::{FileKeyProvider, KeyProvider, StaticKeyProvider};
