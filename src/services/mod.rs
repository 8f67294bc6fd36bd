//! Service layer for the trends monitor.
//!
//! This module contains the acquisition building blocks:
//! - Request pacing (`RateLimiter`)
//! - Trends access (`TrendsSource`, `GoogleTrendsClient`)
//! - Retry handling (`RetryingFetcher`)
//! - Duplicate suppression (`Deduplicator`)
//! - Group resolution (`GroupScheduler`)

mod dedup;
mod fetcher;
mod rate_limiter;
mod scheduler;
mod source;
mod trends;

pub use dedup::{Deduplicator, normalize_title};
pub use fetcher::{FetchFailure, RetryPolicy, RetryingFetcher};
pub use rate_limiter::RateLimiter;
pub use scheduler::{BudgetEstimate, GroupScheduler};
pub use source::{ClientIdentity, IdentityPool, SourceError, TrendsSource};
pub use trends::GoogleTrendsClient;
