// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use crate::models::HttpConfig;
use crate::services::ClientIdentity;

/// Create an asynchronous client for one trends session.
///
/// Cookies are kept for the lifetime of the client, so a new identity always
/// gets a new client.
pub fn create_session_client(
    config: &HttpConfig,
    identity: &ClientIdentity,
) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    if let Ok(language) = HeaderValue::from_str(&identity.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, language);
    }

    reqwest::Client::builder()
        .user_agent(&identity.user_agent)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
}

/// Anti-XSSI guard the trends API puts before its JSON payload.
const XSSI_PREFIX: &str = ")]}'";

/// Strip a leading anti-XSSI guard (`)]}'`, optionally followed by `,`).
///
/// Bodies without the guard are returned trimmed but otherwise untouched.
pub fn strip_xssi(body: &str) -> &str {
    let body = body.trim_start();
    match body.strip_prefix(XSSI_PREFIX) {
        Some(rest) => {
            let rest = rest.trim_start();
            rest.strip_prefix(',').unwrap_or(rest).trim_start()
        }
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_xssi_drops_prefix() {
        assert_eq!(strip_xssi(")]}'\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi(")]}',\n{}"), "{}");
        assert_eq!(strip_xssi("{\"plain\":true}"), "{\"plain\":true}");
    }

    #[test]
    fn test_strip_xssi_leaves_html_intact() {
        let page = "<html><style>body{margin:0}</style>Quota exceeded</html>";
        assert_eq!(strip_xssi(page), page);
    }

    #[test]
    fn test_client_builds_for_identity() {
        let identity = ClientIdentity::new("Mozilla/5.0 test", "en-US,en;q=0.9");
        assert!(create_session_client(&HttpConfig::default(), &identity).is_ok());
    }
}
