// src/services/source.rs

//! Trends data source abstraction.
//!
//! The retry engine only sees this trait, so tests drive it with scripted
//! sources and production uses [`super::GoogleTrendsClient`].

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::models::{DataMode, ErrorClass, RawItem, WorkItem};

/// Failure reported by a trends source for one request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Upstream answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Upstream signalled quota exhaustion in the response body
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Connection, timeout or body transfer failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Well-formed response that carries no related data
    #[error("no data: {0}")]
    Empty(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Map this failure to its retry classification.
    pub fn classify(&self) -> ErrorClass {
        match self {
            SourceError::Status { status: 429, .. } | SourceError::QuotaExceeded(_) => {
                ErrorClass::RateLimit
            }
            SourceError::Status {
                status: 401 | 403 | 407,
                ..
            } => ErrorClass::AuthError,
            SourceError::Transport(_) => ErrorClass::NetworkError,
            SourceError::Empty(_) => ErrorClass::NoData,
            SourceError::Status { .. } | SourceError::Malformed(_) | SourceError::Other(_) => {
                ErrorClass::Unknown
            }
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return SourceError::status(status.as_u16(), error.to_string());
        }
        if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
            return SourceError::Transport(error.to_string());
        }
        if error.is_decode() {
            return SourceError::Malformed(error.to_string());
        }
        SourceError::Other(error.to_string())
    }
}

/// Browser identity presented to the trends service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub accept_language: String,
}

impl ClientIdentity {
    pub fn new(user_agent: impl Into<String>, accept_language: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: accept_language.into(),
        }
    }
}

const BROWSER_IDENTITIES: &[(&str, &str)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "en-US,en;q=0.9",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "en-US,en;q=0.8",
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "en-GB,en;q=0.7",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        "en-US,en;q=0.9",
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "en,en-US;q=0.8",
    ),
];

/// Rotating pool of client identities.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    identities: Vec<ClientIdentity>,
    cursor: usize,
}

impl IdentityPool {
    /// Build a pool from explicit identities, starting at the first one.
    ///
    /// An empty list falls back to the built-in browser identities.
    pub fn new(identities: Vec<ClientIdentity>) -> Self {
        if identities.is_empty() {
            return Self::browsers();
        }
        Self {
            identities,
            cursor: 0,
        }
    }

    /// Built-in browser identities, starting at a random position.
    pub fn browsers() -> Self {
        let identities: Vec<ClientIdentity> = BROWSER_IDENTITIES
            .iter()
            .map(|(ua, lang)| ClientIdentity::new(*ua, *lang))
            .collect();
        let cursor = rand::thread_rng().gen_range(0..identities.len());
        Self { identities, cursor }
    }

    pub fn current(&self) -> &ClientIdentity {
        &self.identities[self.cursor]
    }

    /// Advance to the next identity and return it.
    pub fn rotate(&mut self) -> &ClientIdentity {
        self.cursor = (self.cursor + 1) % self.identities.len();
        self.current()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::browsers()
    }
}

/// Upstream that answers related-data queries for one work item.
///
/// A returned empty vector is a valid "no data" answer.
#[async_trait]
pub trait TrendsSource: Send {
    /// Start a fresh session presenting `identity`. Any previous session is discarded.
    async fn open_session(&mut self, identity: &ClientIdentity) -> Result<(), SourceError>;

    /// Fetch the related data selected by `mode` for `item`.
    async fn related(&mut self, item: &WorkItem, mode: DataMode)
    -> Result<Vec<RawItem>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_maps_status_codes() {
        assert_eq!(SourceError::status(429, "").classify(), ErrorClass::RateLimit);
        assert_eq!(SourceError::status(401, "").classify(), ErrorClass::AuthError);
        assert_eq!(SourceError::status(403, "").classify(), ErrorClass::AuthError);
        assert_eq!(SourceError::status(500, "").classify(), ErrorClass::Unknown);
        assert_eq!(SourceError::status(404, "").classify(), ErrorClass::Unknown);
    }

    #[test]
    fn test_classify_maps_failure_kinds() {
        assert_eq!(
            SourceError::QuotaExceeded("daily".into()).classify(),
            ErrorClass::RateLimit
        );
        assert_eq!(
            SourceError::Transport("timed out".into()).classify(),
            ErrorClass::NetworkError
        );
        assert_eq!(SourceError::Empty("no widget".into()).classify(), ErrorClass::NoData);
        assert_eq!(
            SourceError::Malformed("eof".into()).classify(),
            ErrorClass::Unknown
        );
    }

    #[test]
    fn test_pool_rotates_and_wraps() {
        let mut pool = IdentityPool::new(vec![
            ClientIdentity::new("a", "en"),
            ClientIdentity::new("b", "en"),
        ]);
        assert_eq!(pool.current().user_agent, "a");
        assert_eq!(pool.rotate().user_agent, "b");
        assert_eq!(pool.rotate().user_agent, "a");
    }

    #[test]
    fn test_empty_pool_falls_back_to_browsers() {
        let pool = IdentityPool::new(Vec::new());
        assert_eq!(pool.len(), BROWSER_IDENTITIES.len());
        assert!(pool.current().user_agent.starts_with("Mozilla/5.0"));
    }
}
