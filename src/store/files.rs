//! Per-record file storage.
//!
//! Each record occupies exactly one file, `{records_dir}/{id}.dat`,
//! holding the codec-wrapped payload. Writes go through a temp file +
//! rename so a crash mid-write never leaves a torn record behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::errors::Result;

/// Extension of record files inside the records directory.
const RECORD_EXT: &str = "dat";

/// Handle to the records directory.
pub struct RecordFiles {
    dir: PathBuf,
}

impl RecordFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }

    /// True if the backing file for `id` is present on disk.
    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).exists()
    }

    /// Write the envelope for `id` atomically (temp file + rename).
    pub fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(id);
        let tmp_path = self.dir.join(format!(".{id}.{RECORD_EXT}.tmp"));

        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Read the raw envelope bytes for `id`.
    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(id))?)
    }

    /// Size in bytes of the backing file for `id`.
    pub fn size_of(&self, id: &str) -> Result<u64> {
        Ok(fs::metadata(self.path_for(id))?.len())
    }

    /// Delete the backing file for `id`, returning the bytes freed.
    ///
    /// With `secure` set, the content is overwritten with random bytes and
    /// synced before the unlink. This is best-effort: copy-on-write
    /// filesystems and SSD wear-leveling can retain remnants, so the
    /// guarantee is "harder to recover", not "cryptographically erased".
    pub fn delete(&self, id: &str, secure: bool) -> Result<u64> {
        let path = self.path_for(id);
        let len = fs::metadata(&path)?.len();

        if secure && len > 0 {
            overwrite_with_random(&path, len)?;
        }

        fs::remove_file(&path)?;
        Ok(len)
    }

    /// Ids of every record file on disk, regardless of the index.
    ///
    /// Used by integrity verification and cleanup to find orphans. Temp
    /// files and foreign extensions are skipped.
    pub fn scan_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(stem.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Overwrite a file in place with `len` random bytes and sync to disk.
fn overwrite_with_random(path: &Path, len: u64) -> Result<()> {
    let mut noise = vec![0u8; len as usize];
    rand::rng().fill_bytes(&mut noise);

    let mut file = fs::OpenOptions::new().write(true).open(path)?;
    file.write_all(&noise)?;
    file.sync_all()?;
    Ok(())
}
