// src/services/scheduler.rs

//! Group resolution and work list construction.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, GroupConfig, MINUTES_PER_DAY, WorkItem};

/// Pre-flight duration estimate for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetEstimate {
    pub group_id: String,
    pub work_items: usize,
    /// Items multiplied by the request spacing, no retries
    pub estimated: Duration,
    /// Estimate plus every item spending all retries at the backoff cap
    pub worst_case: Duration,
    pub budget: Duration,
}

impl BudgetEstimate {
    pub fn fits(&self) -> bool {
        self.estimated <= self.budget
    }
}

/// Maps wall-clock time to region groups and expands groups to work items.
#[derive(Debug)]
pub struct GroupScheduler<'a> {
    config: &'a Config,
    /// Owning group index per minute of the day
    slots: Vec<Option<usize>>,
}

impl<'a> GroupScheduler<'a> {
    /// Build the minute table, rejecting windows claimed by two groups.
    pub fn new(config: &'a Config) -> Result<Self> {
        let mut slots = vec![None; MINUTES_PER_DAY as usize];
        for (index, group) in config.groups.iter().enumerate() {
            for window in group.minute_windows()? {
                for minute in window.minutes() {
                    let slot = &mut slots[minute as usize];
                    match *slot {
                        Some(owner) if owner != index => {
                            let other: &GroupConfig = &config.groups[owner];
                            return Err(AppError::config(format!(
                                "groups '{}' and '{}' overlap at {:02}:{:02} UTC",
                                other.id,
                                group.id,
                                minute / 60,
                                minute % 60
                            )));
                        }
                        _ => *slot = Some(index),
                    }
                }
            }
        }
        Ok(Self { config, slots })
    }

    /// Group whose window contains `now` (UTC, minute precision).
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<&'a GroupConfig> {
        let minute = now.hour() * 60 + now.minute();
        self.owner_of(minute as u16).ok_or_else(|| {
            AppError::schedule(format!(
                "no group scheduled at {} UTC",
                now.format("%H:%M")
            ))
        })
    }

    /// Explicit group selection.
    pub fn by_id(&self, id: &str) -> Result<&'a GroupConfig> {
        self.config
            .group(id)
            .ok_or_else(|| AppError::schedule(format!("unknown group '{id}'")))
    }

    pub fn owner_of(&self, minute: u16) -> Option<&'a GroupConfig> {
        let config = self.config;
        self.slots
            .get(minute as usize)
            .copied()
            .flatten()
            .map(|index| &config.groups[index])
    }

    pub fn groups(&self) -> &'a [GroupConfig] {
        &self.config.groups
    }

    /// Ordered work items: region by region, base terms then extra terms.
    pub fn work_list(&self, group: &GroupConfig) -> Vec<WorkItem> {
        let terms = &self.config.terms.base;
        let timeframes = &self.config.timeframes;

        let mut items = Vec::new();
        for region in &group.regions {
            let item = |term: &str, timeframe: &str| WorkItem {
                region_code: region.code.clone(),
                region_name: region.name.clone(),
                term: term.to_string(),
                timeframe: timeframe.to_string(),
            };
            items.extend(terms.iter().map(|t| item(t.as_str(), timeframes.base.as_str())));
            items.extend(
                region
                    .extra_terms
                    .iter()
                    .filter(|t| !terms.contains(*t))
                    .map(|t| item(t.as_str(), timeframes.extra.as_str())),
            );
        }
        items
    }

    /// Estimate run duration for `group` against the execution budget.
    pub fn estimate(&self, group: &GroupConfig) -> BudgetEstimate {
        let engine = &self.config.engine;
        let work_items = self.work_list(group).len();
        let spacing = Duration::from_secs(engine.rate_limit_secs);
        let retry_wait = Duration::from_secs(engine.max_backoff_secs.max(engine.retry_delay_secs))
            .max(spacing);

        let estimated = spacing.saturating_mul(work_items as u32);
        let worst_case = estimated.saturating_add(
            retry_wait.saturating_mul(engine.max_retries.saturating_mul(work_items as u32)),
        );

        BudgetEstimate {
            group_id: group.id.clone(),
            work_items,
            estimated,
            worst_case,
            budget: Duration::from_secs(engine.execution_budget_secs),
        }
    }

    /// Fail when `group` cannot finish inside the execution budget.
    pub fn check_budget(&self, group: &GroupConfig) -> Result<BudgetEstimate> {
        let estimate = self.estimate(group);
        if !estimate.fits() {
            return Err(AppError::config(format!(
                "group '{}': {} items x {}s = {}s exceeds the {}s execution budget",
                group.id,
                estimate.work_items,
                self.config.engine.rate_limit_secs,
                estimate.estimated.as_secs(),
                estimate.budget.as_secs()
            )));
        }
        Ok(estimate)
    }
}
