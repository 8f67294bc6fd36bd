//! Re-export of backed-up records after an export outage.

use crate::models::TrendRecord;
use crate::storage::ExportSink;

/// Counts from a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub exported: usize,
    pub failed: usize,
}

/// Push `records` to `export` in order, continuing past failures.
pub async fn replay_records(records: &[TrendRecord], export: &mut dyn ExportSink) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for record in records {
        match export.accept(record).await {
            Ok(()) => outcome.exported += 1,
            Err(e) => {
                outcome.failed += 1;
                log::warn!("Replay of '{}' failed: {e}", record.title);
            }
        }
    }
    log::info!(
        "Replayed {} records ({} failed)",
        outcome.exported,
        outcome.failed
    );
    outcome
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ExportError;
    use crate::models::DataType;

    struct FlakySink {
        seen: Vec<String>,
    }

    #[async_trait]
    impl ExportSink for FlakySink {
        async fn accept(&mut self, record: &TrendRecord) -> Result<(), ExportError> {
            if record.title.starts_with("bad") {
                return Err(ExportError::Rejected(record.title.clone()));
            }
            self.seen.push(record.title.clone());
            Ok(())
        }
    }

    fn record(title: &str) -> TrendRecord {
        TrendRecord {
            timestamp: "2026-01-22 12:00:00".into(),
            term: "apk".into(),
            region_code: "MX".into(),
            region_name: "Mexico".into(),
            title: title.into(),
            value: "10".into(),
            link: String::new(),
            data_type: DataType::QueryTop,
        }
    }

    #[tokio::test]
    async fn test_replay_keeps_order_and_skips_failures() {
        let mut sink = FlakySink { seen: Vec::new() };
        let records = vec![record("a"), record("bad one"), record("b")];

        let outcome = replay_records(&records, &mut sink).await;

        assert_eq!(outcome, ReplayOutcome { exported: 2, failed: 1 });
        assert_eq!(sink.seen, vec!["a", "b"]);
    }
}
