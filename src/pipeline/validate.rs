// src/pipeline/validate.rs

//! Startup validation: schedule consistency and duration budgets.

use crate::error::Result;
use crate::models::Config;
use crate::services::{BudgetEstimate, GroupScheduler};

/// Validate `config` and build its scheduler.
///
/// Fails when windows overlap or any group cannot finish inside the execution
/// budget. Nothing here touches the network.
pub fn validate_config(config: &Config) -> Result<GroupScheduler<'_>> {
    config.validate()?;
    let scheduler = GroupScheduler::new(config)?;
    for group in scheduler.groups() {
        scheduler.check_budget(group)?;
    }
    Ok(scheduler)
}

/// Budget estimates for every group, in configuration order.
pub fn preflight(scheduler: &GroupScheduler<'_>) -> Vec<BudgetEstimate> {
    scheduler
        .groups()
        .iter()
        .map(|group| scheduler.estimate(group))
        .collect()
}

/// Log a budget estimate the way the `validate` and `plan` commands show it.
pub fn log_estimate(estimate: &BudgetEstimate) {
    let level = if estimate.fits() {
        log::Level::Info
    } else {
        log::Level::Error
    };
    log::log!(
        level,
        "{}: {} items, ~{:.1} min estimated (worst case {:.1} min), budget {:.1} min",
        estimate.group_id,
        estimate.work_items,
        estimate.estimated.as_secs_f64() / 60.0,
        estimate.worst_case.as_secs_f64() / 60.0,
        estimate.budget.as_secs_f64() / 60.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::WindowConfig;

    #[test]
    fn test_default_config_passes() {
        let config = Config::default();
        let scheduler = validate_config(&config).unwrap();
        let estimates = preflight(&scheduler);
        assert_eq!(estimates.len(), 3);
        assert!(estimates.iter().all(BudgetEstimate::fits));
    }

    #[test]
    fn test_over_budget_group_is_fatal() {
        let mut config = Config::default();
        config.engine.rate_limit_secs = 600;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("group_1"));
    }

    #[test]
    fn test_overlapping_windows_are_fatal() {
        let mut config = Config::default();
        config.groups[2].windows = vec![WindowConfig {
            start: "12:40".into(),
            end: "13:00".into(),
        }];
        assert!(validate_config(&config).is_err());
    }
}
