//! Maintenance operations: integrity verification with auto-repair,
//! orphan/expired cleanup, compaction, and aggregate statistics.
//!
//! Repair policy: a dangling index entry (backing file gone) is repaired
//! by dropping the entry, since the data is unrecoverable and the index
//! must stop claiming it exists. Orphan files and checksum mismatches are
//! reported but never silently deleted here; a backup may still recover
//! them. `cleanup()` is the explicit destructive counterpart.

use chrono::{Duration, Utc};

use crate::errors::{Result, TokenVaultError};
use crate::events::EventKind;
use crate::store::backup::BackupStore;
use crate::store::codec;
use crate::store::engine::TokenStore;
use crate::store::files::RecordFiles;
use crate::store::index;
use crate::store::record::{
    CleanupReport, CompactReport, HealthStatus, IntegrityReport, RecordStatus, StoreStats,
};

/// How long an `Expired` record is kept before `cleanup()` drops it,
/// measured from its last access.
const EXPIRED_RETENTION_DAYS: i64 = 30;

/// Usage fraction above which health degrades.
const DEGRADED_USAGE: f64 = 0.8;

/// Fragmentation fraction above which compaction is recommended.
const FRAGMENTATION_THRESHOLD: f64 = 0.25;

impl TokenStore {
    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Walk the index and the records directory, cross-checking both.
    ///
    /// Dangling entries are repaired (removed from the index); orphans
    /// and checksum mismatches are reported as errors. Emits an
    /// `IntegrityCheck` event whether or not problems were found.
    ///
    /// With `auto_cleanup` a failed check triggers a retention sweep that
    /// drops long-expired entries. Orphan files are never deleted by this
    /// path; only an explicit `cleanup()` call removes them.
    pub fn verify_integrity(&self) -> Result<IntegrityReport> {
        let report = self
            .verify_integrity_inner()
            .map_err(|e| self.report("verify_integrity", None, e))?;

        self.events.emit(EventKind::IntegrityCheck {
            valid: report.valid,
            errors: report.errors.len(),
            repaired: report.repaired,
        });

        if !report.valid && self.config.read().auto_cleanup {
            tracing::info!("auto_cleanup enabled, sweeping expired records after failed check");
            let _ = self.cleanup_inner(false);
        }

        Ok(report)
    }

    fn verify_integrity_inner(&self) -> Result<IntegrityReport> {
        let config = self.config.read().clone();
        let files = RecordFiles::new(config.records_dir());

        let mut errors = Vec::new();
        let mut repaired = 0usize;

        {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;

            let ids: Vec<String> = state.index.entries.keys().cloned().collect();
            for id in ids {
                if !files.exists(&id) {
                    errors.push(format!(
                        "record '{id}': backing file missing, index entry removed"
                    ));
                    if let Some(entry) = state.index.entries.remove(&id) {
                        state.index.reclaimable_bytes += entry.size;
                    }
                    repaired += 1;
                    tracing::warn!(id, "repaired dangling index entry");
                    continue;
                }

                let expected = state
                    .index
                    .entries
                    .get(&id)
                    .map(|e| e.checksum.clone())
                    .unwrap_or_default();
                match files.read(&id) {
                    Ok(bytes) => match codec::verify(&bytes) {
                        Ok(actual) if actual == expected => {}
                        Ok(_) => {
                            errors.push(format!("record '{id}': checksum mismatch"));
                        }
                        Err(e) => {
                            errors.push(format!("record '{id}': invalid envelope: {e}"));
                        }
                    },
                    Err(e) => {
                        errors.push(format!("record '{id}': unreadable: {e}"));
                    }
                }
            }

            for id in files.scan_ids()? {
                if !state.index.entries.contains_key(&id) {
                    errors.push(format!("orphan file with no index entry: '{id}'"));
                }
            }

            if repaired > 0 {
                index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
            }
            state.last_integrity_errors = errors.len();
        }

        let valid = errors.is_empty();
        tracing::info!(valid, errors = errors.len(), repaired, "integrity check finished");

        Ok(IntegrityReport {
            valid,
            errors,
            repaired,
        })
    }

    // ------------------------------------------------------------------
    // Cleanup and compaction
    // ------------------------------------------------------------------

    /// Delete orphaned files and drop `Expired` entries past the
    /// retention window. Individual failures are collected, not raised.
    pub fn cleanup(&self) -> Result<CleanupReport> {
        let report = self
            .cleanup_inner(true)
            .map_err(|e| self.report("cleanup", None, e))?;

        self.events.emit(EventKind::Cleanup {
            removed: report.removed,
            reclaimed_bytes: report.reclaimed_bytes,
        });
        Ok(report)
    }

    /// The shared sweep. `delete_orphans` is false on the auto-triggered
    /// path so a routine integrity check cannot destroy files a backup
    /// might still recover.
    fn cleanup_inner(&self, delete_orphans: bool) -> Result<CleanupReport> {
        let config = self.config.read().clone();
        let files = RecordFiles::new(config.records_dir());
        let cutoff = Utc::now() - Duration::days(EXPIRED_RETENTION_DAYS);

        let mut removed = 0usize;
        let mut reclaimed_bytes = 0u64;
        let mut errors = Vec::new();

        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;

        // Orphan files first: on disk, unknown to the index.
        if delete_orphans {
            for id in files.scan_ids()? {
                if state.index.entries.contains_key(&id) {
                    continue;
                }
                match files.delete(&id, false) {
                    Ok(freed) => {
                        removed += 1;
                        reclaimed_bytes += freed;
                        tracing::debug!(id, freed, "deleted orphan file");
                    }
                    Err(e) => errors.push(format!("orphan '{id}': {e}")),
                }
            }
        }

        // Expired entries past the retention window.
        let expired: Vec<String> = state
            .index
            .entries
            .iter()
            .filter(|(_, meta)| meta.status == RecordStatus::Expired && meta.last_accessed < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if files.exists(&id) {
                if let Err(e) = files.delete(&id, false) {
                    errors.push(format!("expired '{id}': {e}"));
                    continue;
                }
            }
            if let Some(entry) = state.index.entries.remove(&id) {
                removed += 1;
                reclaimed_bytes += entry.size;
                tracing::debug!(id, "dropped expired record past retention");
            }
        }

        index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;

        Ok(CleanupReport {
            removed,
            reclaimed_bytes,
            errors,
        })
    }

    /// Rewrite storage to shed the space tracked since prior removals.
    /// A no-op when nothing was removed.
    pub fn compact(&self) -> Result<CompactReport> {
        self.compact_inner()
            .map_err(|e| self.report("compact", None, e))
    }

    fn compact_inner(&self) -> Result<CompactReport> {
        let config = self.config.read().clone();
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(TokenVaultError::NotInitialized)?;

        let reclaimed = state.index.reclaimable_bytes;
        let records = state.index.entries.len();
        if reclaimed == 0 {
            return Ok(CompactReport {
                records,
                reclaimed_bytes: 0,
            });
        }

        state.index.reclaimable_bytes = 0;
        index::write_index(&config.index_path(), &state.index, &state.index_hmac_key)?;
        tracing::info!(records, reclaimed, "compacted index");

        Ok(CompactReport {
            records,
            reclaimed_bytes: reclaimed,
        })
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Aggregate counts, sizes, fragmentation, and a health classification
    /// derived from the configured size budget and recent integrity
    /// findings.
    pub fn stats(&self) -> Result<StoreStats> {
        self.stats_inner().map_err(|e| self.report("stats", None, e))
    }

    fn stats_inner(&self) -> Result<StoreStats> {
        let config = self.config.read().clone();
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(TokenVaultError::NotInitialized)?;

        let total_records = state.index.entries.len();
        let total_size = state.index.total_size();
        let reclaimable_bytes = state.index.reclaimable_bytes;

        let occupied = total_size + reclaimable_bytes;
        let fragmentation = if occupied == 0 {
            0.0
        } else {
            reclaimable_bytes as f64 / occupied as f64
        };

        let backup_count = BackupStore::new(config.backup_dir()).list()?.len();

        let usage = if config.max_storage_size == 0 {
            0.0
        } else {
            total_size as f64 / config.max_storage_size as f64
        };

        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        if usage >= 1.0 {
            warnings.push(format!(
                "storage budget exceeded: {total_size} of {} bytes used",
                config.max_storage_size
            ));
            recommendations.push("remove unused credentials or raise max_storage_size".into());
        } else if usage >= DEGRADED_USAGE {
            warnings.push(format!(
                "storage usage at {:.0}% of the configured budget",
                usage * 100.0
            ));
        }
        if state.last_integrity_errors > 0 {
            warnings.push(format!(
                "last integrity check reported {} error(s)",
                state.last_integrity_errors
            ));
            recommendations.push("run cleanup() or restore from a recent backup".into());
        }
        if fragmentation > FRAGMENTATION_THRESHOLD {
            recommendations.push("run compact() to reclaim space from removed records".into());
        }
        if backup_count == 0 && total_records > 0 {
            recommendations.push("no backups retained; run backup()".into());
        }

        let health = if usage >= 1.0 {
            HealthStatus::Critical
        } else if usage >= DEGRADED_USAGE || state.last_integrity_errors > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Ok(StoreStats {
            total_records,
            total_size,
            reclaimable_bytes,
            fragmentation,
            backup_count,
            health,
            warnings,
            recommendations,
        })
    }
}
