// src/storage/backup.rs

//! Per-run record backups.
//!
//! Each run appends its batches to `backups/trends_backup_<stamp>_<group>.jsonl`.
//! A backup can be replayed into the export sink after an export outage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use super::local::{append, list_files};
use crate::error::{AppError, Result};
use crate::models::TrendRecord;
use crate::storage::BackupSink;
use crate::utils::FILE_STAMP;

pub const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "trends_backup_";
const BACKUP_EXTENSION: &str = "jsonl";

/// Backup sink writing one JSON-lines file per run.
#[derive(Debug, Clone)]
pub struct LocalBackup {
    path: PathBuf,
    stored: usize,
}

impl LocalBackup {
    /// Backup file for a run of `group_id` started at `started_at`.
    pub fn new(root: impl AsRef<Path>, group_id: &str, started_at: DateTime<Utc>) -> Self {
        let name = format!(
            "{BACKUP_PREFIX}{}_{group_id}.{BACKUP_EXTENSION}",
            started_at.format(FILE_STAMP)
        );
        Self {
            path: root.as_ref().join(BACKUPS_DIR).join(name),
            stored: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn stored(&self) -> usize {
        self.stored
    }
}

#[async_trait]
impl BackupSink for LocalBackup {
    async fn store(&mut self, records: &[TrendRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut lines = String::new();
        for record in records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        append(&self.path, lines.as_bytes())
            .await
            .map_err(|e| AppError::backup(self.path.display().to_string(), e))?;

        self.stored += records.len();
        log::debug!(
            "Backed up {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Backup files under `root`, newest first.
pub async fn list_backups(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = root.as_ref().join(BACKUPS_DIR);
    let names = list_files(&dir, BACKUP_EXTENSION).await?;
    Ok(names
        .into_iter()
        .rev()
        .filter(|name| name.starts_with(BACKUP_PREFIX))
        .map(|name| dir.join(name))
        .collect())
}

/// Read every record of a backup file.
pub async fn load_backup(path: impl AsRef<Path>) -> Result<Vec<TrendRecord>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| {
                AppError::backup(
                    path.display().to_string(),
                    format!("line {}: {e}", index + 1),
                )
            })
        })
        .collect()
}

/// Creation time encoded in a backup file name.
fn backup_time(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_stem()?.to_str()?;
    let stamp = name.strip_prefix(BACKUP_PREFIX)?.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, FILE_STAMP)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Delete backups older than `keep_days` relative to `now`. Returns the number removed.
pub async fn cleanup_old_backups(
    root: impl AsRef<Path>,
    keep_days: u64,
    now: DateTime<Utc>,
) -> Result<usize> {
    // A retention beyond the representable calendar keeps everything.
    let Some(cutoff) = i64::try_from(keep_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|keep| now.checked_sub_signed(keep))
    else {
        return Ok(0);
    };
    let mut removed = 0;

    for path in list_backups(root).await? {
        let Some(created) = backup_time(&path) else {
            continue;
        };
        if created < cutoff {
            tokio::fs::remove_file(&path).await?;
            log::info!("Removed old backup {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}
