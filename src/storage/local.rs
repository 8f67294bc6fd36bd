//! Local filesystem storage implementation.
//!
//! Sheets are JSON-lines files named after the spreadsheet tab, so a row is
//! appended as soon as a record is accepted. Metrics are single JSON documents
//! written atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, ExportError, Result};
use crate::models::{DataType, RunSummary, TrendRecord};
use crate::storage::ExportSink;
use crate::utils::FILE_STAMP;

pub(crate) const SHEETS_DIR: &str = "sheets";
pub(crate) const METRICS_DIR: &str = "metrics";

/// Local filesystem storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        ensure_parent(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write the run summary to `metrics/metrics_<stamp>_<group>.json`.
    pub async fn write_metrics(&self, summary: &RunSummary) -> Result<PathBuf> {
        let key = format!(
            "{METRICS_DIR}/metrics_{}_{}.json",
            summary.started_at.format(FILE_STAMP),
            summary.group_id
        );
        self.write_json(&key, &MetricsReport::from(summary)).await?;
        log::info!("Metrics saved to {}", self.path(&key).display());
        Ok(self.path(&key))
    }

    /// Most recent metrics document, if any run has been recorded.
    pub async fn latest_metrics(&self) -> Result<Option<MetricsReport>> {
        let names = list_files(&self.path(METRICS_DIR), "json").await?;
        match names.last() {
            Some(name) => self.read_json(&format!("{METRICS_DIR}/{name}")).await,
            None => Ok(None),
        }
    }

    /// Row count per sheet tab; tabs without a file count as zero.
    pub async fn sheet_row_counts(&self) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for data_type in DataType::ALL {
            let key = sheet_key(data_type.sheet_name());
            let rows = match self.read_bytes(&key).await? {
                Some(bytes) => bytes
                    .split(|b| *b == b'\n')
                    .filter(|line| !line.is_empty())
                    .count(),
                None => 0,
            };
            counts.insert(data_type.sheet_name().to_string(), rows);
        }
        Ok(counts)
    }
}

/// Persisted form of a [`RunSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Percentage of attempted items that succeeded
    pub success_rate: f64,
}

impl From<&RunSummary> for MetricsReport {
    fn from(summary: &RunSummary) -> Self {
        Self {
            summary: summary.clone(),
            success_rate: summary.success_rate(),
        }
    }
}

/// Row as it appears in a sheet tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SheetRow {
    pub timestamp: String,
    pub term: String,
    pub country_code: String,
    pub country_name: String,
    pub title: String,
    pub value: String,
    pub link: String,
}

impl From<&TrendRecord> for SheetRow {
    fn from(record: &TrendRecord) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            term: record.term.clone(),
            country_code: record.region_code.clone(),
            country_name: record.region_name.clone(),
            title: record.title.clone(),
            value: record.value.clone(),
            link: record.link.clone(),
        }
    }
}

/// Export sink appending rows to one file per sheet tab.
#[derive(Debug, Clone)]
pub struct LocalSheets {
    storage: LocalStorage,
}

impl LocalSheets {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    pub fn sheet_path(&self, data_type: DataType) -> PathBuf {
        self.storage.path(&sheet_key(data_type.sheet_name()))
    }
}

#[async_trait]
impl ExportSink for LocalSheets {
    async fn accept(&mut self, record: &TrendRecord) -> std::result::Result<(), ExportError> {
        let sheet = record.data_type.sheet_name();
        let mut line = serde_json::to_string(&SheetRow::from(record))
            .map_err(|e| ExportError::Rejected(e.to_string()))?;
        line.push('\n');

        append(&self.sheet_path(record.data_type), line.as_bytes())
            .await
            .map_err(|e| ExportError::write(sheet, e))
    }
}

fn sheet_key(sheet: &str) -> String {
    format!("{SHEETS_DIR}/{sheet}.jsonl")
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Append bytes to a file, creating it and its directory when missing.
pub(crate) async fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

/// File names in `dir` with the given extension, sorted ascending.
pub(crate) async fn list_files(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{Disposition, ErrorClass, RunTally};

    fn record(data_type: DataType, title: &str) -> TrendRecord {
        TrendRecord {
            timestamp: "2026-01-22 06:01:00".into(),
            term: "apk".into(),
            region_code: "IN".into(),
            region_name: "India".into(),
            title: title.into(),
            value: "100".into(),
            link: "https://trends.google.com/trends/explore?q=x".into(),
            data_type,
        }
    }

    #[tokio::test]
    async fn test_sheets_append_rows_per_tab() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let mut sheets = LocalSheets::new(storage.clone());

        sheets.accept(&record(DataType::QueryTop, "a")).await.unwrap();
        sheets.accept(&record(DataType::QueryTop, "b")).await.unwrap();
        sheets.accept(&record(DataType::QueryRising, "c")).await.unwrap();

        let counts = storage.sheet_row_counts().await.unwrap();
        assert_eq!(counts["Related_Queries_Top"], 2);
        assert_eq!(counts["Related_Queries_Rising"], 1);
        assert_eq!(counts["Related_Topics_Top"], 0);

        let content = std::fs::read_to_string(sheets.sheet_path(DataType::QueryTop)).unwrap();
        let first: SheetRow = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.country_code, "IN");
        assert_eq!(first.title, "a");
    }

    #[tokio::test]
    async fn test_unwritable_sheet_reports_export_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the sheets directory should be
        std::fs::write(dir.path().join(SHEETS_DIR), b"").unwrap();
        let mut sheets = LocalSheets::new(LocalStorage::new(dir.path()));

        let err = sheets
            .accept(&record(DataType::QueryTop, "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
    }

    #[tokio::test]
    async fn test_metrics_roundtrip_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.latest_metrics().await.unwrap().is_none());

        let mut tally = RunTally::default();
        tally.record_success(4);
        tally.record_failure(ErrorClass::RateLimit);
        let started = Utc.with_ymd_and_hms(2026, 1, 22, 6, 0, 0).unwrap();
        let summary = RunSummary::new(
            "group_1",
            started,
            tally,
            Duration::from_secs(300),
            Disposition::Degraded,
        );

        let path = storage.write_metrics(&summary).await.unwrap();
        assert!(path.ends_with("metrics/metrics_20260122_060000_group_1.json"));

        let latest = storage.latest_metrics().await.unwrap().unwrap();
        assert_eq!(latest.summary.group_id, "group_1");
        assert_eq!(latest.success_rate, 50.0);
        assert_eq!(latest.summary.disposition, Disposition::Degraded);
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.write_json("metrics/x.json", &vec![1, 2, 3]).await.unwrap();

        assert!(dir.path().join("metrics/x.json").exists());
        assert!(!dir.path().join("metrics/x.tmp").exists());
        let back: Option<Vec<u32>> = storage.read_json("metrics/x.json").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }
}
