//! Storage abstractions for trend records.
//!
//! Records flow to two sinks: the export sink receives every record as soon
//! as it is accepted, and the backup sink receives each batch first so a
//! failed export can be replayed later.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── sheets/                          # Export: one JSON-lines file per tab
//! │   ├── Related_Queries_Top.jsonl
//! │   └── Related_Queries_Rising.jsonl
//! ├── backups/                         # Backup: one file per run
//! │   └── trends_backup_20260122_060000_group_1.jsonl
//! └── metrics/                         # One run summary per run
//!     └── metrics_20260122_060000_group_1.json
//! ```

pub mod backup;
pub mod dry_run;
pub mod local;

use async_trait::async_trait;

use crate::error::{ExportError, Result};
use crate::models::TrendRecord;

// Re-export for convenience
pub use backup::{LocalBackup, cleanup_old_backups, list_backups, load_backup};
pub use dry_run::DryRunSink;
pub use local::{LocalSheets, LocalStorage, MetricsReport};

/// Destination for accepted records, fed one record at a time in arrival order.
#[async_trait]
pub trait ExportSink: Send {
    async fn accept(&mut self, record: &TrendRecord) -> std::result::Result<(), ExportError>;
}

/// Durable copy of every batch, written before the batch is exported.
#[async_trait]
pub trait BackupSink: Send {
    async fn store(&mut self, records: &[TrendRecord]) -> Result<()>;
}
