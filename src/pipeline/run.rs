// src/pipeline/run.rs

//! Acquisition run for one region group.
//!
//! Work items are processed strictly in order. A failing item is tallied and
//! the run moves on; nothing short of a setup error stops it early.

use std::time::Instant;

use chrono::Utc;

use crate::models::{Config, DataMode, GroupConfig, RunSummary, RunTally, TrendRecord, WorkItem};
use crate::pipeline::disposition::{DispositionConfig, DispositionPolicy};
use crate::services::{
    Deduplicator, GroupScheduler, IdentityPool, RateLimiter, RetryPolicy, RetryingFetcher,
    TrendsSource,
};
use crate::storage::{BackupSink, ExportSink};
use crate::utils::record_timestamp;

/// Drives fetch, dedupe, backup and export for every work item of a group.
pub struct AcquisitionOrchestrator<'a, S> {
    scheduler: &'a GroupScheduler<'a>,
    fetcher: RetryingFetcher<'a, S>,
    dedup: Deduplicator,
    export: &'a mut dyn ExportSink,
    backup: &'a mut dyn BackupSink,
    policy: DispositionPolicy,
}

impl<'a, S: TrendsSource> AcquisitionOrchestrator<'a, S> {
    pub fn new(
        config: &Config,
        scheduler: &'a GroupScheduler<'a>,
        fetcher: RetryingFetcher<'a, S>,
        export: &'a mut dyn ExportSink,
        backup: &'a mut dyn BackupSink,
    ) -> Self {
        Self {
            scheduler,
            fetcher,
            dedup: Deduplicator::from_config(&config.dedup),
            export,
            backup,
            policy: DispositionPolicy::with_config(DispositionConfig::from(&config.run)),
        }
    }

    /// Orchestrator with the production fetcher wiring for `config`.
    pub fn from_config(
        config: &Config,
        scheduler: &'a GroupScheduler<'a>,
        limiter: &'a RateLimiter,
        source: S,
        mode: DataMode,
        export: &'a mut dyn ExportSink,
        backup: &'a mut dyn BackupSink,
    ) -> Self {
        let fetcher = RetryingFetcher::new(
            source,
            limiter,
            RetryPolicy::from_config(&config.engine),
            IdentityPool::browsers(),
            mode,
        );
        Self::new(config, scheduler, fetcher, export, backup)
    }

    /// Run every work item of `group` and summarize the outcome.
    pub async fn run(&mut self, group: &GroupConfig) -> RunSummary {
        let started_at = Utc::now();
        let clock = Instant::now();

        let items = self.scheduler.work_list(group);
        let total = items.len();
        log::info!(
            "Starting {}: {} work items across {} regions ({:?} mode)",
            group.id,
            total,
            group.regions.len(),
            self.fetcher.mode()
        );

        let mut tally = RunTally::default();
        for (index, item) in items.iter().enumerate() {
            log::info!("[{}/{}] {}", index + 1, total, item);
            self.process(item, &mut tally).await;
        }

        log::debug!(
            "Dedup: {} distinct records kept, {} duplicates dropped",
            self.dedup.seen(),
            self.dedup.dropped()
        );
        let disposition = self.policy.evaluate(&tally);
        RunSummary::new(
            group.id.clone(),
            started_at,
            tally,
            clock.elapsed(),
            disposition,
        )
    }

    async fn process(&mut self, item: &WorkItem, tally: &mut RunTally) {
        let raw = match self.fetcher.fetch(item).await {
            Ok(raw) => raw,
            Err(failure) => {
                log::error!("Giving up on {item}: {failure}");
                tally.record_failure(failure.class);
                return;
            }
        };
        tally.record_success(raw.len());
        if raw.is_empty() {
            return;
        }

        let timestamp = record_timestamp(Utc::now());
        let records: Vec<TrendRecord> = raw
            .into_iter()
            .map(|r| TrendRecord::from_raw(item, r, &timestamp))
            .collect();
        let fetched = records.len();
        let fresh = self.dedup.dedupe(records);
        tally.duplicates_dropped += fetched - fresh.len();
        if fresh.is_empty() {
            log::debug!("All {fetched} records for {item} were duplicates");
            return;
        }

        if let Err(e) = self.backup.store(&fresh).await {
            tally.backup_failures += 1;
            log::error!("Backup failed for {item}: {e}");
        }

        for record in &fresh {
            match self.export.accept(record).await {
                Ok(()) => tally.record_emitted(record.data_type.sheet_name()),
                Err(e) => {
                    tally.export_failures += 1;
                    log::warn!("Export failed for '{}' ({item}): {e}", record.title);
                }
            }
        }
    }
}
