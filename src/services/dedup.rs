// src/services/dedup.rs

//! Run-scoped record deduplication.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::models::{DataType, DedupConfig, TrendRecord};

/// Normalize a title for duplicate detection.
///
/// NFKC fold, lowercase, trim outer whitespace. Full-width and ligature forms
/// collapse onto their plain equivalents.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title.nfkc().collect();
    folded.to_lowercase().trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    /// `None` when titles are merged across terms
    term: Option<String>,
    region_code: String,
    data_type: DataType,
    title: String,
}

/// Drops records already seen during the current run.
///
/// First occurrence wins and arrival order is preserved.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
    merge_across_terms: bool,
    dropped: usize,
}

impl Deduplicator {
    pub fn new(merge_across_terms: bool) -> Self {
        Self {
            merge_across_terms,
            ..Self::default()
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.merge_across_terms)
    }

    fn key(&self, record: &TrendRecord) -> DedupKey {
        DedupKey {
            term: (!self.merge_across_terms).then(|| record.term.clone()),
            region_code: record.region_code.clone(),
            data_type: record.data_type,
            title: normalize_title(&record.title),
        }
    }

    /// Keep the records whose key has not been seen earlier in this run.
    pub fn dedupe(&mut self, records: Vec<TrendRecord>) -> Vec<TrendRecord> {
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let key = self.key(&record);
            if self.seen.insert(key) {
                kept.push(record);
            } else {
                self.dropped += 1;
            }
        }
        kept
    }

    /// Records dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}
