//! Export sink that only logs, for runs that must not touch the sheets.

use async_trait::async_trait;

use crate::error::ExportError;
use crate::models::TrendRecord;
use crate::storage::ExportSink;

/// Accepts every record and logs it instead of persisting it.
#[derive(Debug, Default)]
pub struct DryRunSink {
    accepted: usize,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }
}

#[async_trait]
impl ExportSink for DryRunSink {
    async fn accept(&mut self, record: &TrendRecord) -> Result<(), ExportError> {
        self.accepted += 1;
        log::info!(
            "[dry-run] [{}] {} {}: {}",
            record.data_type.sheet_name(),
            record.region_code,
            record.title,
            record.value
        );
        Ok(())
    }
}
