//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Minutes in a day; schedule windows are expressed in minute-of-day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Upper bound for any configured delay, spacing or budget.
pub const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

/// Upper bound for retries per work item.
pub const MAX_RETRIES: u32 = 100;

/// Upper bound for backup retention.
pub const MAX_BACKUP_KEEP_DAYS: u64 = 10 * 365;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Request cadence, retry and budget limits
    pub engine: EngineConfig,

    /// Base search terms monitored in every region
    pub terms: TermsConfig,

    /// Timeframe per term class
    #[serde(default)]
    pub timeframes: TimeframeConfig,

    /// Deduplication behavior
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Run disposition and housekeeping
    #[serde(default)]
    pub run: RunConfig,

    /// Trends HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Region groups, each with its own execution window
    pub groups: Vec<GroupConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Any missing or invalid field is a configuration error; there is no
    /// fallback to defaults for a run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| AppError::config(format!("invalid {}: {e}", path.display())))
    }

    /// Apply `TRENDS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(secs) = env_number("TRENDS_RATE_LIMIT_SECS")? {
            self.engine.rate_limit_secs = secs;
        }
        if let Some(retries) = env_number("TRENDS_MAX_RETRIES")? {
            self.engine.max_retries = retries;
        }
        if let Some(secs) = env_number("TRENDS_EXECUTION_BUDGET_SECS")? {
            self.engine.execution_budget_secs = secs;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Window overlap and duration budgets need the resolved work lists and
    /// are checked by `pipeline::validate_config`.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.terms.base.is_empty() {
            return Err(AppError::config("terms.base is empty"));
        }
        if self.terms.base.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::config("terms.base contains a blank term"));
        }

        self.timeframes.validate()?;

        self.run.validate()?;
        url::Url::parse(&self.http.base_url)
            .map_err(|e| AppError::config(format!("http.base_url is not a URL: {e}")))?;
        if self.http.timeout_secs == 0 {
            return Err(AppError::config("http.timeout_secs must be > 0"));
        }

        if self.groups.is_empty() {
            return Err(AppError::config("No groups defined"));
        }
        let mut ids = HashSet::new();
        for group in &self.groups {
            group.validate()?;
            if !ids.insert(group.id.as_str()) {
                return Err(AppError::config(format!("duplicate group id '{}'", group.id)));
            }
        }
        Ok(())
    }

    /// Find a group by id.
    pub fn group(&self, id: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.id == id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            terms: TermsConfig::default(),
            timeframes: TimeframeConfig::default(),
            dedup: DedupConfig::default(),
            run: RunConfig::default(),
            http: HttpConfig::default(),
            groups: defaults::groups(),
        }
    }
}

fn env_number<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => parse_number(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

/// Parse a whole number, rejecting values the target type cannot hold.
fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        AppError::config(format!("{name}={raw:?} is not a whole number in range"))
    })
}

/// Request cadence and retry limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum spacing between outbound requests
    pub rate_limit_secs: u64,

    /// Retries after the initial attempt
    pub max_retries: u32,

    /// First rate-limit backoff delay, doubled per retry
    pub backoff_base_secs: u64,

    /// Upper bound for any rate-limit backoff delay
    pub max_backoff_secs: u64,

    /// Fixed delay before retrying a network failure
    pub retry_delay_secs: u64,

    /// Wall-clock budget the scheduler host grants one run
    pub execution_budget_secs: u64,

    /// Random spread applied to the rate-limit interval (0.05 = ±5%)
    #[serde(default = "defaults::rate_limit_jitter")]
    pub rate_limit_jitter: f64,

    /// Random extra applied to backoff delays (0.25 = up to +25%)
    #[serde(default = "defaults::backoff_jitter")]
    pub backoff_jitter: f64,
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.rate_limit_secs == 0 {
            return Err(AppError::config("engine.rate_limit_secs must be > 0"));
        }
        for (name, secs) in [
            ("rate_limit_secs", self.rate_limit_secs),
            ("backoff_base_secs", self.backoff_base_secs),
            ("max_backoff_secs", self.max_backoff_secs),
            ("retry_delay_secs", self.retry_delay_secs),
            ("execution_budget_secs", self.execution_budget_secs),
        ] {
            if secs > MAX_DELAY_SECS {
                return Err(AppError::config(format!(
                    "engine.{name}={secs} exceeds {MAX_DELAY_SECS}s"
                )));
            }
        }
        if self.max_retries > MAX_RETRIES {
            return Err(AppError::config(format!(
                "engine.max_retries must be <= {MAX_RETRIES}"
            )));
        }
        if self.rate_limit_secs < 60 {
            log::warn!(
                "engine.rate_limit_secs={} is low, upstream may answer with 429",
                self.rate_limit_secs
            );
        }
        if self.backoff_base_secs == 0 {
            return Err(AppError::config("engine.backoff_base_secs must be > 0"));
        }
        if self.max_backoff_secs < self.backoff_base_secs {
            return Err(AppError::config(
                "engine.max_backoff_secs must be >= engine.backoff_base_secs",
            ));
        }
        if self.execution_budget_secs == 0 {
            return Err(AppError::config("engine.execution_budget_secs must be > 0"));
        }
        if !(0.0..=0.05).contains(&self.rate_limit_jitter) {
            return Err(AppError::config(
                "engine.rate_limit_jitter must be within [0, 0.05]",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(AppError::config("engine.backoff_jitter must be within [0, 1]"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit_secs: 90,
            max_retries: 2,
            backoff_base_secs: 60,
            max_backoff_secs: 180,
            retry_delay_secs: 30,
            execution_budget_secs: 90 * 60,
            rate_limit_jitter: defaults::rate_limit_jitter(),
            backoff_jitter: defaults::backoff_jitter(),
        }
    }
}

/// Base search terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsConfig {
    pub base: Vec<String>,
}

impl Default for TermsConfig {
    fn default() -> Self {
        Self {
            base: defaults::base_terms(),
        }
    }
}

/// Timeframe per term class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeConfig {
    /// Timeframe for base terms
    #[serde(default = "defaults::timeframe")]
    pub base: String,

    /// Timeframe for region-specific extra terms
    #[serde(default = "defaults::timeframe")]
    pub extra: String,
}

impl TimeframeConfig {
    fn validate(&self) -> Result<()> {
        // now N-H / now N-d / today N-m / today N-y / all / explicit date range
        let pattern = Regex::new(
            r"^(now \d+-[Hd]|today \d+-[my]|all|\d{4}-\d{2}-\d{2} \d{4}-\d{2}-\d{2})$",
        )
        .map_err(|e| AppError::config(e.to_string()))?;

        for (name, value) in [("base", &self.base), ("extra", &self.extra)] {
            if !pattern.is_match(value) {
                return Err(AppError::config(format!(
                    "timeframes.{name}={value:?} is not a trends timeframe"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            base: defaults::timeframe(),
            extra: defaults::timeframe(),
        }
    }
}

/// Deduplication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Collapse the same title surfaced by different terms in one region
    #[serde(default)]
    pub merge_across_terms: bool,
}

/// Run disposition and housekeeping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Failure ratio at or above which a run is `failed` instead of `degraded`
    #[serde(default = "defaults::failed_ratio_threshold")]
    pub failed_ratio_threshold: f64,

    /// Backups older than this many days are removed at run start
    #[serde(default = "defaults::backup_keep_days")]
    pub backup_keep_days: u64,
}

impl RunConfig {
    fn validate(&self) -> Result<()> {
        if !(self.failed_ratio_threshold > 0.0 && self.failed_ratio_threshold <= 1.0) {
            return Err(AppError::config(
                "run.failed_ratio_threshold must be in (0, 1]",
            ));
        }
        if self.backup_keep_days > MAX_BACKUP_KEEP_DAYS {
            return Err(AppError::config(format!(
                "run.backup_keep_days must be <= {MAX_BACKUP_KEEP_DAYS}"
            )));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            failed_ratio_threshold: defaults::failed_ratio_threshold(),
            backup_keep_days: defaults::backup_keep_days(),
        }
    }
}

/// Trends HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Trends service origin
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// `hl` parameter
    #[serde(default = "defaults::host_language")]
    pub host_language: String,

    /// `tz` parameter, minutes offset from UTC as the API expects it
    #[serde(default = "defaults::tz_offset")]
    pub tz_offset: i32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            host_language: defaults::host_language(),
            tz_offset: defaults::tz_offset(),
        }
    }
}

/// A batch of regions sharing one execution window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,

    /// Minute-of-day windows (UTC) in which this group is resolved
    pub windows: Vec<WindowConfig>,

    /// Regions in processing order
    pub regions: Vec<RegionConfig>,
}

impl GroupConfig {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::config("group id is empty"));
        }
        if self.regions.is_empty() {
            return Err(AppError::config(format!("group '{}' has no regions", self.id)));
        }
        if self.windows.is_empty() {
            return Err(AppError::config(format!("group '{}' has no windows", self.id)));
        }
        for window in &self.windows {
            window.parse().map_err(|e| {
                AppError::config(format!("group '{}': {e}", self.id))
            })?;
        }

        let code_pattern = Regex::new(r"^(WW|[A-Z]{2}(-[A-Z0-9]{1,3})?)$")
            .map_err(|e| AppError::config(e.to_string()))?;
        let mut codes = HashSet::new();
        for region in &self.regions {
            if !code_pattern.is_match(&region.code) {
                return Err(AppError::config(format!(
                    "group '{}': invalid region code {:?}",
                    self.id, region.code
                )));
            }
            if region.name.trim().is_empty() {
                return Err(AppError::config(format!(
                    "group '{}': region {} has no name",
                    self.id, region.code
                )));
            }
            if region.extra_terms.iter().any(|t| t.trim().is_empty()) {
                return Err(AppError::config(format!(
                    "group '{}': region {} has a blank extra term",
                    self.id, region.code
                )));
            }
            if !codes.insert(region.code.as_str()) {
                return Err(AppError::config(format!(
                    "group '{}': region {} listed twice",
                    self.id, region.code
                )));
            }
        }
        Ok(())
    }

    /// Parsed schedule windows.
    pub fn minute_windows(&self) -> Result<Vec<MinuteWindow>> {
        self.windows.iter().map(WindowConfig::parse).collect()
    }
}

/// A region and its localized extra terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// ISO country code, or `WW` for worldwide
    pub code: String,

    pub name: String,

    /// Localized terms queried after the base terms in this region only
    #[serde(default)]
    pub extra_terms: Vec<String>,
}

/// A schedule window as written in the config file (`"HH:MM"`, UTC, inclusive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

impl WindowConfig {
    pub fn parse(&self) -> Result<MinuteWindow> {
        Ok(MinuteWindow {
            start: parse_minute(&self.start)?,
            end: parse_minute(&self.end)?,
        })
    }
}

fn parse_minute(value: &str) -> Result<u16> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::config(format!("window time {value:?} is not HH:MM")))?;
    Ok((time.hour() * 60 + time.minute()) as u16)
}

/// Inclusive minute-of-day range; `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteWindow {
    pub start: u16,
    pub end: u16,
}

impl MinuteWindow {
    pub fn contains(&self, minute: u16) -> bool {
        if self.start <= self.end {
            (self.start..=self.end).contains(&minute)
        } else {
            minute >= self.start || minute <= self.end
        }
    }

    /// Minutes covered by this window, in day order.
    pub fn minutes(&self) -> impl Iterator<Item = u16> + '_ {
        (0..MINUTES_PER_DAY).filter(move |m| self.contains(*m))
    }
}

mod defaults {
    use super::{GroupConfig, RegionConfig, WindowConfig};

    pub fn rate_limit_jitter() -> f64 {
        0.05
    }
    pub fn backoff_jitter() -> f64 {
        0.25
    }
    pub fn timeframe() -> String {
        "now 1-d".into()
    }
    pub fn failed_ratio_threshold() -> f64 {
        1.0
    }
    pub fn backup_keep_days() -> u64 {
        7
    }

    // HTTP defaults
    pub fn base_url() -> String {
        "https://trends.google.com".into()
    }
    pub fn timeout() -> u64 {
        25
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn host_language() -> String {
        "en-US".into()
    }
    pub fn tz_offset() -> i32 {
        360
    }

    pub fn base_terms() -> Vec<String> {
        vec!["apk".into(), "download apk".into(), "apk games".into()]
    }

    fn region(code: &str, name: &str, extra_terms: &[&str]) -> RegionConfig {
        RegionConfig {
            code: code.to_string(),
            name: name.to_string(),
            extra_terms: extra_terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn window(start: &str, end: &str) -> WindowConfig {
        WindowConfig {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn groups() -> Vec<GroupConfig> {
        vec![
            GroupConfig {
                id: "group_1".into(),
                windows: vec![window("06:00", "06:44")],
                regions: vec![
                    region("WW", "Worldwide", &[]),
                    region("IN", "India", &[]),
                    region("US", "United States", &[]),
                    region("BR", "Brazil", &["baixar apk"]),
                ],
            },
            GroupConfig {
                id: "group_2".into(),
                windows: vec![window("12:00", "12:44")],
                regions: vec![
                    region("ID", "Indonesia", &["unduh apk"]),
                    region("MX", "Mexico", &["descargar apk"]),
                    region("GB", "United Kingdom", &[]),
                    region("AU", "Australia", &[]),
                ],
            },
            GroupConfig {
                id: "group_3".into(),
                windows: vec![window("18:00", "18:44")],
                regions: vec![
                    region("VN", "Vietnam", &["tải apk"]),
                    region("DE", "Germany", &[]),
                    region("RU", "Russia", &["скачать apk"]),
                ],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.engine.rate_limit_secs = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_delays_and_retention() {
        let mut config = Config::default();
        config.engine.rate_limit_secs = u64::MAX / 2;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.engine.max_backoff_secs = MAX_DELAY_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.max_retries = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.run.backup_keep_days = 200_000_000_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backup_keep_days"));

        let mut config = Config::default();
        config.engine.max_backoff_secs = MAX_DELAY_SECS;
        config.run.backup_keep_days = MAX_BACKUP_KEEP_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_numeric_override_rejects_values_that_do_not_fit() {
        assert_eq!(parse_number::<u32>("TRENDS_MAX_RETRIES", " 3 ").unwrap(), 3);
        assert!(matches!(
            parse_number::<u32>("TRENDS_MAX_RETRIES", "4294967296"),
            Err(AppError::Config(_))
        ));
        assert!(parse_number::<u64>("TRENDS_RATE_LIMIT_SECS", "-1").is_err());
    }

    #[test]
    fn test_validate_rejects_backoff_cap_below_base() {
        let mut config = Config::default();
        config.engine.max_backoff_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_terms_and_groups() {
        let mut config = Config::default();
        config.terms.base.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.groups.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_timeframe_and_region_code() {
        let mut config = Config::default();
        config.timeframes.extra = "yesterday".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.groups[0].regions[1].code = "india".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_region_in_group() {
        let mut config = Config::default();
        let dup = config.groups[0].regions[0].clone();
        config.groups[0].regions.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_parses_minimal_file_and_rejects_missing_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[engine]
rate_limit_secs = 90
max_retries = 2
backoff_base_secs = 60
max_backoff_secs = 180
retry_delay_secs = 30
execution_budget_secs = 5400

[terms]
base = ["apk"]

[[groups]]
id = "group_1"
windows = [{ start = "06:00", end = "06:44" }]

[[groups.regions]]
code = "BR"
name = "Brazil"
extra_terms = ["baixar apk"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeframes.base, "now 1-d");
        assert_eq!(config.groups[0].regions[0].extra_terms, vec!["baixar apk"]);
        assert!(config.validate().is_ok());

        std::fs::write(&path, "[terms]\nbase = [\"apk\"]\n").unwrap();
        assert!(matches!(Config::load(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_window_parsing_and_wraparound() {
        let window = WindowConfig {
            start: "23:30".into(),
            end: "00:15".into(),
        }
        .parse()
        .unwrap();
        assert!(window.contains(23 * 60 + 45));
        assert!(window.contains(10));
        assert!(!window.contains(60));
        assert_eq!(window.minutes().count(), 46);

        let bad = WindowConfig {
            start: "25:00".into(),
            end: "01:00".into(),
        };
        assert!(bad.parse().is_err());
    }
}
