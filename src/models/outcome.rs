//! Fetch classification and per-run outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification attached to every fetch attempt that did not yield data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    RateLimit,
    /// Valid empty result, never counted as a failure
    NoData,
    AuthError,
    NetworkError,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "RATE_LIMIT",
            ErrorClass::NoData => "NO_DATA",
            ErrorClass::AuthError => "AUTH_ERROR",
            ErrorClass::NetworkError => "NETWORK_ERROR",
            ErrorClass::Unknown => "UNKNOWN",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::RateLimit | ErrorClass::NetworkError)
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ErrorClass::NoData)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Clean,
    Degraded,
    Failed,
}

impl Disposition {
    /// Process exit code the scheduler host reacts to.
    pub fn exit_code(&self) -> u8 {
        match self {
            Disposition::Clean => 0,
            Disposition::Failed => 1,
            Disposition::Degraded => 2,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Disposition::Clean => "clean",
            Disposition::Degraded => "degraded",
            Disposition::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Running counters kept by the orchestrator while a run is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub no_data: usize,
    pub failures_by_classification: BTreeMap<ErrorClass, usize>,
    pub records_emitted: usize,
    pub duplicates_dropped: usize,
    pub export_failures: usize,
    pub backup_failures: usize,
    pub records_by_sheet: BTreeMap<String, usize>,
}

impl RunTally {
    pub fn record_success(&mut self, record_count: usize) {
        self.attempted += 1;
        self.succeeded += 1;
        if record_count == 0 {
            self.no_data += 1;
        }
    }

    pub fn record_failure(&mut self, class: ErrorClass) {
        self.attempted += 1;
        self.failed += 1;
        *self.failures_by_classification.entry(class).or_default() += 1;
    }

    pub fn record_emitted(&mut self, sheet: &str) {
        self.records_emitted += 1;
        *self.records_by_sheet.entry(sheet.to_string()).or_default() += 1;
    }

    /// Share of attempted items that failed, `0.0` when nothing was attempted.
    pub fn failure_ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.failed as f64 / self.attempted as f64
        }
    }
}

/// Structured outcome of one invocation, created once when the run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub group_id: String,
    pub started_at: DateTime<Utc>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub no_data: usize,
    pub failures_by_classification: BTreeMap<ErrorClass, usize>,
    pub records_emitted: usize,
    pub duplicates_dropped: usize,
    pub export_failures: usize,
    pub backup_failures: usize,
    pub records_by_sheet: BTreeMap<String, usize>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub disposition: Disposition,
}

impl RunSummary {
    pub fn new(
        group_id: impl Into<String>,
        started_at: DateTime<Utc>,
        tally: RunTally,
        duration: Duration,
        disposition: Disposition,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            started_at,
            attempted: tally.attempted,
            succeeded: tally.succeeded,
            failed: tally.failed,
            no_data: tally.no_data,
            failures_by_classification: tally.failures_by_classification,
            records_emitted: tally.records_emitted,
            duplicates_dropped: tally.duplicates_dropped,
            export_failures: tally.export_failures,
            backup_failures: tally.backup_failures,
            records_by_sheet: tally.records_by_sheet,
            duration,
            disposition,
        }
    }

    /// Percentage of attempted items that succeeded, rounded to one decimal.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        let rate = self.succeeded as f64 / self.attempted as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }

    /// Failure class with the highest count, if any item failed.
    pub fn dominant_failure(&self) -> Option<ErrorClass> {
        self.failures_by_classification
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(class, _)| *class)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
