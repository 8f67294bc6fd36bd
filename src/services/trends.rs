// src/services/trends.rs

//! Google Trends related-data client.
//!
//! Two calls per widget: `explore` returns widget tokens for the keyword,
//! `widgetdata/relatedsearches` returns the ranked lists. Index 0 of the
//! ranked lists is "top", index 1 is "rising".

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use super::source::{ClientIdentity, SourceError, TrendsSource};
use crate::error::Result;
use crate::models::{DataMode, DataType, ErrorClass, HttpConfig, RawItem, WorkItem};
use crate::utils::http::{create_session_client, strip_xssi};

const EXPLORE_PATH: &str = "/trends/api/explore";
const RELATED_PATH: &str = "/trends/api/widgetdata/relatedsearches";
const QUERIES_WIDGET: &str = "RELATED_QUERIES";
const TOPICS_WIDGET: &str = "RELATED_TOPICS";

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RelatedResponse {
    #[serde(rename = "default")]
    ranked: Option<RankedLists>,
}

#[derive(Debug, Default, Deserialize)]
struct RankedLists {
    #[serde(rename = "rankedList", default)]
    lists: Vec<RankedList>,
}

#[derive(Debug, Default, Deserialize)]
struct RankedList {
    #[serde(rename = "rankedKeyword", default)]
    entries: Vec<RankedEntry>,
}

#[derive(Debug, Deserialize)]
struct RankedEntry {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    topic: Option<Topic>,
    #[serde(default)]
    value: Value,
    #[serde(rename = "formattedValue", default)]
    formatted_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    #[serde(default)]
    mid: String,
    #[serde(default)]
    title: String,
}

impl RankedEntry {
    fn display_value(&self) -> String {
        if let Some(formatted) = self.formatted_value.as_deref().filter(|v| !v.is_empty()) {
            return formatted.to_string();
        }
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    fn into_raw(self, data_type: DataType) -> Option<RawItem> {
        let value = self.display_value();
        if data_type.is_topic() {
            let topic = self.topic?;
            let link_token = if topic.mid.is_empty() {
                None
            } else {
                Some(topic.mid)
            };
            Some(RawItem {
                data_type,
                title: topic.title,
                value,
                link_token,
            })
        } else {
            let query = self.query?;
            Some(RawItem {
                data_type,
                title: query.clone(),
                value,
                link_token: Some(query),
            })
        }
    }
}

/// Trends client speaking the public explore/widgetdata API.
pub struct GoogleTrendsClient {
    config: HttpConfig,
    client: Option<Client>,
}

impl GoogleTrendsClient {
    /// Create a client; no connection is made until a session is opened.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Url::parse(&config.base_url)?;
        Ok(Self {
            config: config.clone(),
            client: None,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> std::result::Result<Url, SourceError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse_with_params(&format!("{base}{path}"), params)
            .map_err(|e| SourceError::Other(format!("invalid endpoint {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, SourceError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SourceError::Other("session not opened".into()))?;

        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(strip_xssi(&body)).map_err(|e| {
            if body.to_ascii_lowercase().contains("quota") {
                SourceError::QuotaExceeded("quota page instead of JSON".into())
            } else {
                SourceError::Malformed(e.to_string())
            }
        })
    }

    async fn explore(&self, item: &WorkItem) -> std::result::Result<Vec<Widget>, SourceError> {
        let request = json!({
            "comparisonItem": [{
                "keyword": item.term,
                "time": item.timeframe,
                "geo": item.geo(),
            }],
            "category": 0,
            "property": "",
        })
        .to_string();
        let tz = self.config.tz_offset.to_string();
        let url = self.endpoint(
            EXPLORE_PATH,
            &[
                ("hl", self.config.host_language.as_str()),
                ("tz", tz.as_str()),
                ("req", request.as_str()),
            ],
        )?;

        let response: ExploreResponse = self.get_json(url).await?;
        Ok(response.widgets)
    }

    async fn ranked_lists(&self, widget: &Widget) -> std::result::Result<Vec<RankedList>, SourceError> {
        let token = widget
            .token
            .as_deref()
            .ok_or_else(|| SourceError::Malformed(format!("widget {} has no token", widget.id)))?;
        let request = widget
            .request
            .as_ref()
            .ok_or_else(|| SourceError::Malformed(format!("widget {} has no request", widget.id)))?
            .to_string();
        let tz = self.config.tz_offset.to_string();
        let url = self.endpoint(
            RELATED_PATH,
            &[
                ("hl", self.config.host_language.as_str()),
                ("tz", tz.as_str()),
                ("req", request.as_str()),
                ("token", token),
            ],
        )?;

        let response: RelatedResponse = self.get_json(url).await?;
        Ok(response.ranked.unwrap_or_default().lists)
    }

    async fn widget_items(
        &self,
        widget: &Widget,
        top: DataType,
        rising: DataType,
    ) -> std::result::Result<Vec<RawItem>, SourceError> {
        let mut lists = self.ranked_lists(widget).await?.into_iter();
        let mut items = Vec::new();
        for data_type in [top, rising] {
            let Some(list) = lists.next() else { break };
            items.extend(list.entries.into_iter().filter_map(|e| e.into_raw(data_type)));
        }
        Ok(items)
    }
}

fn find_widget<'a>(widgets: &'a [Widget], prefix: &str) -> Option<&'a Widget> {
    widgets.iter().find(|w| w.id.starts_with(prefix))
}

#[async_trait]
impl TrendsSource for GoogleTrendsClient {
    async fn open_session(&mut self, identity: &ClientIdentity) -> std::result::Result<(), SourceError> {
        let client = create_session_client(&self.config, identity)
            .map_err(|e| SourceError::Other(format!("cannot build HTTP client: {e}")))?;

        // Best effort: the explore page hands out the session cookie
        let warmup = self.endpoint("/trends/explore", &[("geo", "US")])?;
        match client.get(warmup).send().await {
            Ok(response) => log::debug!("Session warm-up answered {}", response.status()),
            Err(e) => log::debug!("Session warm-up failed: {e}"),
        }

        self.client = Some(client);
        Ok(())
    }

    async fn related(
        &mut self,
        item: &WorkItem,
        mode: DataMode,
    ) -> std::result::Result<Vec<RawItem>, SourceError> {
        let widgets = self.explore(item).await?;

        let queries = find_widget(&widgets, QUERIES_WIDGET);
        let topics = if mode.includes_topics() {
            find_widget(&widgets, TOPICS_WIDGET)
        } else {
            None
        };
        if queries.is_none() && topics.is_none() {
            return Err(SourceError::Empty(format!("no related widgets for {item}")));
        }

        let mut items = Vec::new();
        if let Some(widget) = queries {
            items.extend(
                self.widget_items(widget, DataType::QueryTop, DataType::QueryRising)
                    .await?,
            );
        }
        if let Some(widget) = topics {
            match self
                .widget_items(widget, DataType::TopicTop, DataType::TopicRising)
                .await
            {
                Ok(topic_items) => items.extend(topic_items),
                // Topic payloads are unstable; keep the queries we already have
                Err(e) if e.classify() == ErrorClass::Unknown => {
                    log::warn!("Skipping related topics for {item}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }
}
