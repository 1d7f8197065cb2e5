//! The integrity codec applied to every payload before it touches disk.
//!
//! A codec-wrapped blob has this layout:
//!
//! ```text
//! [TVLT: 4 bytes][version: 1 byte][flags: 1 byte][SHA-256: 32 bytes][body]
//! ```
//!
//! - **Magic** (`TVLT`): identifies the blob as a tokenvault envelope.
//! - **Version**: envelope format version (currently `1`).
//! - **Flags**: bit 0 = body is LZ4-compressed, bit 1 = body is encrypted.
//! - **SHA-256**: digest of the body, checked before any decoding.
//! - **Body**: payload bytes, compressed then encrypted per the flags.
//!
//! Decoding follows the flags stored in the envelope, not the current
//! configuration, so records written under an older config stay readable.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::keys::KEY_LEN;
use crate::errors::{Result, TokenVaultError};

/// Magic bytes at the start of every envelope.
const MAGIC: &[u8; 4] = b"TVLT";

/// Current envelope format version.
pub const CODEC_VERSION: u8 = 1;

/// Body is LZ4-compressed.
const FLAG_COMPRESSED: u8 = 0b01;

/// Body is AES-256-GCM encrypted.
const FLAG_ENCRYPTED: u8 = 0b10;

/// Size of the SHA-256 digest embedded in the envelope.
const CHECKSUM_LEN: usize = 32;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 1 (flags) + 32 (digest).
const PREFIX_LEN: usize = 6 + CHECKSUM_LEN;

/// A codec-wrapped payload ready to be written to disk.
pub struct Encoded {
    /// The full envelope bytes.
    pub bytes: Vec<u8>,
    /// Envelope length in bytes, as recorded in the index.
    pub size: u64,
    /// Base64 SHA-256 digest of the body, as recorded in the index.
    pub checksum: String,
}

/// Checksum + compression + encryption pipeline for one context.
///
/// The key, when present, is a derived sub-key (per-record or backup),
/// never the raw master key.
pub struct Codec {
    compress: bool,
    key: Option<[u8; KEY_LEN]>,
}

impl Codec {
    pub fn new(compress: bool, key: Option<[u8; KEY_LEN]>) -> Self {
        Self { compress, key }
    }

    /// Wrap `plaintext` into an envelope: compress, encrypt, checksum.
    pub fn encode(&self, plaintext: &[u8]) -> Result<Encoded> {
        let mut flags = 0u8;

        let mut body = if self.compress {
            flags |= FLAG_COMPRESSED;
            lz4_flex::compress_prepend_size(plaintext)
        } else {
            plaintext.to_vec()
        };

        if let Some(key) = &self.key {
            flags |= FLAG_ENCRYPTED;
            body = encrypt(key, &body)?;
        }

        let digest = Sha256::digest(&body);

        let mut bytes = Vec::with_capacity(PREFIX_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(CODEC_VERSION);
        bytes.push(flags);
        bytes.extend_from_slice(&digest);
        bytes.extend_from_slice(&body);

        Ok(Encoded {
            size: bytes.len() as u64,
            checksum: checksum_to_string(&digest),
            bytes,
        })
    }

    /// Unwrap an envelope: verify the checksum, decrypt, decompress.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (flags, body) = split_envelope(data)?;

        let body = if flags & FLAG_ENCRYPTED != 0 {
            let key = self.key.as_ref().ok_or_else(|| {
                TokenVaultError::Codec("envelope is encrypted but no key is available".into())
            })?;
            decrypt(key, body)?
        } else {
            body.to_vec()
        };

        if flags & FLAG_COMPRESSED != 0 {
            lz4_flex::decompress_size_prepended(&body)
                .map_err(|e| TokenVaultError::Codec(format!("decompression failed: {e}")))
        } else {
            Ok(body)
        }
    }
}

/// Verify an envelope's checksum without decoding the body.
///
/// Returns the base64 digest so callers can compare it against the index.
pub fn verify(data: &[u8]) -> Result<String> {
    let (_, body) = split_envelope(data)?;
    let digest = Sha256::digest(body);
    Ok(checksum_to_string(&digest))
}

/// Parse the fixed prefix, check the digest, and return `(flags, body)`.
fn split_envelope(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.len() < PREFIX_LEN {
        return Err(TokenVaultError::Codec(
            "blob too small to be a valid envelope".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(TokenVaultError::Codec("missing TVLT magic bytes".into()));
    }

    let version = data[4];
    if version != CODEC_VERSION {
        return Err(TokenVaultError::Codec(format!(
            "unsupported envelope version {version}, expected {CODEC_VERSION}"
        )));
    }

    let flags = data[5];
    let stored_digest = &data[6..PREFIX_LEN];
    let body = &data[PREFIX_LEN..];

    let digest = Sha256::digest(body);
    let matches: bool = digest.as_slice().ct_eq(stored_digest).into();
    if !matches {
        return Err(TokenVaultError::Codec("checksum mismatch".into()));
    }

    Ok((flags, body))
}

/// Base64 form of a digest, as stored in the index.
pub fn checksum_to_string(digest: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    BASE64.encode(digest)
}
