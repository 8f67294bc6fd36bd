// src/pipeline/health.rs

//! Connectivity check against the trends service.
//!
//! One worldwide fetch of the first base term. A rate-limited answer still
//! proves the service is reachable.

use crate::models::{Config, ErrorClass, RawItem, WORLDWIDE, WorkItem};
use crate::services::{FetchFailure, RetryingFetcher, TrendsSource};

/// Result of a single connectivity fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrendsHealth {
    /// Service answered with related data
    Reachable { items: usize },
    /// Service answered but had nothing for the term
    NoData,
    /// Service answered with a rate-limit signal
    RateLimited,
    /// Service could not be used
    Unreachable(FetchFailure),
}

impl TrendsHealth {
    pub fn from_fetch(result: Result<Vec<RawItem>, FetchFailure>) -> Self {
        match result {
            Ok(items) if items.is_empty() => Self::NoData,
            Ok(items) => Self::Reachable { items: items.len() },
            Err(failure) if failure.class == ErrorClass::RateLimit => Self::RateLimited,
            Err(failure) => Self::Unreachable(failure),
        }
    }

    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::Unreachable(_))
    }
}

/// Work item used for the connectivity fetch.
pub fn health_item(config: &Config) -> WorkItem {
    WorkItem {
        region_code: WORLDWIDE.to_string(),
        region_name: "Worldwide".to_string(),
        term: config.terms.base.first().cloned().unwrap_or_default(),
        timeframe: config.timeframes.base.clone(),
    }
}

/// Fetch `item` once through `fetcher` and report reachability.
pub async fn check_trends<S: TrendsSource>(
    fetcher: &mut RetryingFetcher<'_, S>,
    item: &WorkItem,
) -> TrendsHealth {
    let health = TrendsHealth::from_fetch(fetcher.fetch(item).await);
    match &health {
        TrendsHealth::Reachable { items } => log::info!("  [OK] Google Trends: {items} items"),
        TrendsHealth::NoData => log::info!("  [OK] Google Trends: reachable, no data"),
        TrendsHealth::RateLimited => {
            log::warn!("  [WARN] Google Trends: rate limited, connectivity OK")
        }
        TrendsHealth::Unreachable(failure) => log::error!("  [FAIL] Google Trends: {failure}"),
    }
    health
}
