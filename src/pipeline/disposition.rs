//! Run disposition policy.
//!
//! Decides whether a finished run is clean, degraded or failed from its
//! tally. A run that attempted nothing or succeeded at nothing is always
//! failed; otherwise the failure ratio is compared to the threshold.

use crate::models::{Disposition, RunConfig, RunTally};

/// Disposition policy configuration.
#[derive(Debug, Clone)]
pub struct DispositionConfig {
    /// Failure ratio at or above which the run is failed (0, 1]. Default: 1.0
    pub failed_ratio_threshold: f64,
}

impl Default for DispositionConfig {
    fn default() -> Self {
        Self {
            failed_ratio_threshold: 1.0,
        }
    }
}

impl From<&RunConfig> for DispositionConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            failed_ratio_threshold: run.failed_ratio_threshold,
        }
    }
}

/// Result of a disposition check.
#[derive(Debug, Clone, PartialEq)]
pub enum DispositionCheck {
    /// Every attempted item succeeded
    Clean { attempted: usize },
    /// Some items failed, ratio below the threshold
    Degraded {
        failed: usize,
        attempted: usize,
        failure_ratio: f64,
    },
    /// Failure ratio reached the threshold
    ThresholdReached {
        failed: usize,
        attempted: usize,
        failure_ratio: f64,
    },
    /// Nothing succeeded
    NoSuccess { attempted: usize },
    /// Work list was empty
    NothingAttempted,
}

impl DispositionCheck {
    pub fn disposition(&self) -> Disposition {
        match self {
            DispositionCheck::Clean { .. } => Disposition::Clean,
            DispositionCheck::Degraded { .. } => Disposition::Degraded,
            DispositionCheck::ThresholdReached { .. }
            | DispositionCheck::NoSuccess { .. }
            | DispositionCheck::NothingAttempted => Disposition::Failed,
        }
    }
}

/// Maps a run tally to its disposition.
#[derive(Debug, Clone, Default)]
pub struct DispositionPolicy {
    config: DispositionConfig,
}

impl DispositionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DispositionConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, tally: &RunTally) -> DispositionCheck {
        let attempted = tally.attempted;
        let failed = tally.failed;

        if attempted == 0 {
            return DispositionCheck::NothingAttempted;
        }
        if tally.succeeded == 0 {
            return DispositionCheck::NoSuccess { attempted };
        }
        if failed == 0 {
            return DispositionCheck::Clean { attempted };
        }

        let failure_ratio = tally.failure_ratio();
        if failure_ratio >= self.config.failed_ratio_threshold {
            DispositionCheck::ThresholdReached {
                failed,
                attempted,
                failure_ratio,
            }
        } else {
            DispositionCheck::Degraded {
                failed,
                attempted,
                failure_ratio,
            }
        }
    }

    /// Check the tally, log the verdict, and return the disposition.
    pub fn evaluate(&self, tally: &RunTally) -> Disposition {
        let check = self.check(tally);
        match &check {
            DispositionCheck::Clean { attempted } => {
                log::info!("Disposition: CLEAN ({attempted} items, no failures)");
            }
            DispositionCheck::Degraded {
                failed,
                attempted,
                failure_ratio,
            } => {
                log::warn!(
                    "Disposition: DEGRADED ({failed}/{attempted} items failed, {:.1}%)",
                    failure_ratio * 100.0
                );
            }
            DispositionCheck::ThresholdReached {
                failed,
                attempted,
                failure_ratio,
            } => {
                log::error!(
                    "Disposition: FAILED ({failed}/{attempted} items failed, {:.1}% >= {:.1}% threshold)",
                    failure_ratio * 100.0,
                    self.config.failed_ratio_threshold * 100.0
                );
            }
            DispositionCheck::NoSuccess { attempted } => {
                log::error!("Disposition: FAILED (none of {attempted} items succeeded)");
            }
            DispositionCheck::NothingAttempted => {
                log::error!("Disposition: FAILED (empty work list)");
            }
        }
        check.disposition()
    }
}
