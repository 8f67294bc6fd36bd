// src/services/fetcher.rs

//! Retrying fetch of related data for one work item.
//!
//! Every attempt, retries included, goes through the shared [`RateLimiter`].
//! Rate-limit failures back off exponentially, network failures wait a fixed
//! delay, and everything else fails immediately. Before a retry the session is
//! reopened with the next client identity.

use std::time::Duration;

use rand::Rng;

use super::rate_limiter::RateLimiter;
use super::source::{IdentityPool, SourceError, TrendsSource};
use crate::models::{DataMode, EngineConfig, ErrorClass, RawItem, WorkItem};

/// Delay schedule between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
    pub retry_delay: Duration,
    /// Upper bound of the random extra added to backoff (0.25 = up to +25%)
    pub backoff_jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self {
            max_retries: engine.max_retries,
            backoff_base: Duration::from_secs(engine.backoff_base_secs),
            max_backoff: Duration::from_secs(engine.max_backoff_secs),
            retry_delay: Duration::from_secs(engine.retry_delay_secs),
            backoff_jitter: engine.backoff_jitter.clamp(0.0, 1.0),
        }
    }

    /// Backoff before retry `retry` (1-based) without jitter, capped.
    pub fn backoff_floor(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }

    /// Backoff before retry `retry` with jitter applied, still capped.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let floor = self.backoff_floor(retry);
        if self.backoff_jitter <= 0.0 {
            return floor;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.backoff_jitter);
        Duration::try_from_secs_f64(floor.as_secs_f64() * (1.0 + extra))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// Delay before retry `retry` after a failure of `class`.
    pub fn delay_for(&self, class: ErrorClass, retry: u32) -> Duration {
        match class {
            ErrorClass::RateLimit => self.backoff_delay(retry),
            _ => self.retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Terminal failure of one work item after retries are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub class: ErrorClass,
    /// Attempts made, including the initial one
    pub attempts: u32,
    pub message: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.class, self.attempts, self.message
        )
    }
}

/// Fetches related data for work items with classification-driven retries.
pub struct RetryingFetcher<'a, S> {
    source: S,
    limiter: &'a RateLimiter,
    policy: RetryPolicy,
    identities: IdentityPool,
    mode: DataMode,
    session_open: bool,
}

impl<'a, S: TrendsSource> RetryingFetcher<'a, S> {
    pub fn new(
        source: S,
        limiter: &'a RateLimiter,
        policy: RetryPolicy,
        identities: IdentityPool,
        mode: DataMode,
    ) -> Self {
        Self {
            source,
            limiter,
            policy,
            identities,
            mode,
            session_open: false,
        }
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Fetch related data for `item`.
    ///
    /// An empty vector is a valid no-data answer. `Err` is returned only once
    /// the failure is non-retryable or retries are exhausted.
    pub async fn fetch(&mut self, item: &WorkItem) -> Result<Vec<RawItem>, FetchFailure> {
        let mut retry = 0;
        loop {
            self.limiter.acquire().await;
            let attempt = retry + 1;

            let error = match self.attempt(item).await {
                Ok(items) => {
                    if items.is_empty() {
                        log::info!("No data for {item}");
                    } else {
                        log::info!("Fetched {} items for {item}", items.len());
                    }
                    return Ok(items);
                }
                Err(error) => error,
            };

            let class = error.classify();
            if class == ErrorClass::NoData {
                log::info!("No data for {item}: {error}");
                return Ok(Vec::new());
            }

            if !class.is_retryable() || retry >= self.policy.max_retries {
                log::error!("{class} for {item} on attempt {attempt}: {error}");
                return Err(FetchFailure {
                    class,
                    attempts: attempt,
                    message: error.to_string(),
                });
            }

            retry += 1;
            let delay = self.policy.delay_for(class, retry);
            log::warn!(
                "{class} for {item} on attempt {attempt}, retrying in {:.0}s ({retry}/{})",
                delay.as_secs_f64(),
                self.policy.max_retries
            );
            tokio::time::sleep(delay).await;

            self.identities.rotate();
            self.session_open = false;
        }
    }

    async fn attempt(&mut self, item: &WorkItem) -> Result<Vec<RawItem>, SourceError> {
        if !self.session_open {
            self.source.open_session(self.identities.current()).await?;
            self.session_open = true;
        }
        self.source.related(item, self.mode).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::models::DataType;
    use crate::services::ClientIdentity;

    /// Source that replays scripted answers and records what it was asked.
    #[derive(Default)]
    struct ScriptedSource {
        script: VecDeque<Result<Vec<RawItem>, SourceError>>,
        calls: usize,
        sessions: Vec<String>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<RawItem>, SourceError>>) -> Self {
            Self {
                script: script.into(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TrendsSource for ScriptedSource {
        async fn open_session(&mut self, identity: &ClientIdentity) -> Result<(), SourceError> {
            self.sessions.push(identity.user_agent.clone());
            Ok(())
        }

        async fn related(
            &mut self,
            _item: &WorkItem,
            _mode: DataMode,
        ) -> Result<Vec<RawItem>, SourceError> {
            self.calls += 1;
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Other("script exhausted".into())))
        }
    }

    fn item() -> WorkItem {
        WorkItem {
            region_code: "BR".into(),
            region_name: "Brazil".into(),
            term: "baixar apk".into(),
            timeframe: "now 1-d".into(),
        }
    }

    fn raw(title: &str) -> RawItem {
        RawItem {
            data_type: DataType::QueryTop,
            title: title.into(),
            value: "100".into(),
            link_token: Some(title.into()),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            backoff_jitter: 0.0,
            ..RetryPolicy::default()
        }
    }

    fn identities() -> IdentityPool {
        IdentityPool::new(vec![
            ClientIdentity::new("ua-1", "en"),
            ClientIdentity::new("ua-2", "en"),
            ClientIdentity::new("ua-3", "en"),
        ])
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(90)).with_jitter(0.0)
    }

    fn fetcher<'a>(
        limiter: &'a RateLimiter,
        script: Vec<Result<Vec<RawItem>, SourceError>>,
    ) -> RetryingFetcher<'a, ScriptedSource> {
        RetryingFetcher::new(
            ScriptedSource::new(script),
            limiter,
            policy(),
            identities(),
            DataMode::Reduced,
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff_floor(1), Duration::from_secs(60));
        assert_eq!(policy.backoff_floor(2), Duration::from_secs(120));
        assert_eq!(policy.backoff_floor(3), Duration::from_secs(180));
        assert_eq!(policy.backoff_floor(10), Duration::from_secs(180));
    }

    #[test]
    fn test_jittered_backoff_stays_between_floor_and_cap() {
        let policy = RetryPolicy {
            backoff_jitter: 1.0,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let first = policy.backoff_delay(1);
            assert!(first >= Duration::from_secs(60));
            assert!(first <= Duration::from_secs(120));
            assert_eq!(policy.backoff_delay(3), Duration::from_secs(180));
        }
    }

    #[test]
    fn test_jittered_backoff_never_shrinks_between_retries() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
            backoff_jitter: 1.0,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delays: Vec<Duration> = (1..=7).map(|n| policy.backoff_delay(n)).collect();
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
            assert_eq!(delays[6], Duration::from_secs(300));
        }
    }

    #[test]
    fn test_huge_backoff_cap_does_not_overflow() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_secs(u64::MAX / 2),
            max_backoff: Duration::MAX,
            backoff_jitter: 1.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(3), Duration::MAX);
    }

    #[test]
    fn test_network_failures_use_fixed_delay() {
        let policy = policy();
        assert_eq!(
            policy.delay_for(ErrorClass::NetworkError, 2),
            Duration::from_secs(30)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let limiter = limiter();
        let mut fetcher = fetcher(&limiter, vec![Ok(vec![raw("whatsapp apk")])]);

        let items = fetcher.fetch(&item()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(fetcher.source().calls, 1);
        assert_eq!(fetcher.source().sessions, vec!["ua-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_makes_three_attempts() {
        let limiter = limiter();
        let script = vec![
            Err(SourceError::status(429, "Too Many Requests")),
            Err(SourceError::status(429, "Too Many Requests")),
            Err(SourceError::status(429, "Too Many Requests")),
            Ok(vec![raw("never reached")]),
        ];
        let mut fetcher = fetcher(&limiter, script);

        let start = Instant::now();
        let failure = fetcher.fetch(&item()).await.unwrap_err();

        assert_eq!(failure.class, ErrorClass::RateLimit);
        assert_eq!(failure.attempts, 3);
        assert_eq!(fetcher.source().calls, 3);
        // 60s then 120s of backoff
        assert!(start.elapsed() >= Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rotates_identity() {
        let limiter = limiter();
        let script = vec![
            Err(SourceError::Transport("connection reset".into())),
            Ok(vec![raw("capcut apk")]),
        ];
        let mut fetcher = fetcher(&limiter, script);

        let items = fetcher.fetch(&item()).await.unwrap();
        assert_eq!(items[0].title, "capcut apk");
        assert_eq!(fetcher.source().sessions, vec!["ua-1", "ua-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_retry_waits_at_least_rate_limit() {
        let limiter = limiter();
        let script = vec![
            Err(SourceError::Transport("timed out".into())),
            Ok(Vec::new()),
        ];
        let mut fetcher = fetcher(&limiter, script);

        let start = Instant::now();
        fetcher.fetch(&item()).await.unwrap();
        // 30s retry delay is shorter than the 90s request spacing
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_is_not_retried() {
        let limiter = limiter();
        let script = vec![
            Err(SourceError::status(403, "Forbidden")),
            Ok(vec![raw("never reached")]),
        ];
        let mut fetcher = fetcher(&limiter, script);

        let failure = fetcher.fetch(&item()).await.unwrap_err();
        assert_eq!(failure.class, ErrorClass::AuthError);
        assert_eq!(failure.attempts, 1);
        assert_eq!(fetcher.source().calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_error_is_not_retried() {
        let limiter = limiter();
        let mut fetcher = fetcher(&limiter, vec![Err(SourceError::Malformed("eof".into()))]);

        let failure = fetcher.fetch(&item()).await.unwrap_err();
        assert_eq!(failure.class, ErrorClass::Unknown);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_answer_is_no_data_not_failure() {
        let limiter = limiter();
        let mut fetcher = fetcher(
            &limiter,
            vec![Err(SourceError::Empty("no widgets".into())), Ok(vec![raw("x")])],
        );

        let items = fetcher.fetch(&item()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(fetcher.source().calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let limiter = limiter();
        let mut fetcher = RetryingFetcher::new(
            ScriptedSource::new(vec![Err(SourceError::status(429, "Too Many Requests"))]),
            &limiter,
            RetryPolicy {
                max_retries: 0,
                ..policy()
            },
            identities(),
            DataMode::Reduced,
        );

        let failure = fetcher.fetch(&item()).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
    }
}
