//! Work items and trend records.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Public explore page used to build record links.
const EXPLORE_URL: &str = "https://trends.google.com/trends/explore";

/// Region code that stands for the whole world.
pub const WORLDWIDE: &str = "WW";

/// Kind of related signal a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    QueryTop,
    QueryRising,
    TopicTop,
    TopicRising,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::QueryTop,
        DataType::QueryRising,
        DataType::TopicTop,
        DataType::TopicRising,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::QueryTop => "query_top",
            DataType::QueryRising => "query_rising",
            DataType::TopicTop => "topic_top",
            DataType::TopicRising => "topic_rising",
        }
    }

    /// Spreadsheet tab the record is exported to.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            DataType::QueryTop => "Related_Queries_Top",
            DataType::QueryRising => "Related_Queries_Rising",
            DataType::TopicTop => "Related_Topics_Top",
            DataType::TopicRising => "Related_Topics_Rising",
        }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, DataType::TopicTop | DataType::TopicRising)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which related widgets are requested per work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    /// Related queries only
    #[default]
    Reduced,
    /// Related queries and related topics
    Full,
}

impl DataMode {
    pub fn includes_topics(&self) -> bool {
        matches!(self, DataMode::Full)
    }
}

/// One `(region, term, timeframe)` unit of acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub region_code: String,
    pub region_name: String,
    pub term: String,
    pub timeframe: String,
}

impl WorkItem {
    /// Geo parameter expected by the trends API (`WW` maps to the empty geo).
    pub fn geo(&self) -> &str {
        if self.region_code == WORLDWIDE {
            ""
        } else {
            &self.region_code
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' in {} ({}) [{}]",
            self.term, self.region_name, self.region_code, self.timeframe
        )
    }
}

/// An entry returned by the trends source before it is stamped with run context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub data_type: DataType,
    pub title: String,
    pub value: String,
    /// Query text or topic id used to build the explore link
    pub link_token: Option<String>,
}

/// A deduplicated record handed to the export sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRecord {
    /// UTC fetch time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    pub term: String,
    pub region_code: String,
    pub region_name: String,
    pub title: String,
    pub value: String,
    pub link: String,
    pub data_type: DataType,
}

impl TrendRecord {
    /// Build a record from a raw item fetched for `item`.
    pub fn from_raw(item: &WorkItem, raw: RawItem, timestamp: &str) -> Self {
        let link = raw
            .link_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| explore_link(token, item.geo(), &item.timeframe))
            .unwrap_or_default();

        Self {
            timestamp: timestamp.to_string(),
            term: item.term.clone(),
            region_code: item.region_code.clone(),
            region_name: item.region_name.clone(),
            title: raw.title,
            value: raw.value,
            link,
            data_type: raw.data_type,
        }
    }
}

/// Explore page link for a query or topic id in a region.
pub fn explore_link(token: &str, geo: &str, timeframe: &str) -> String {
    let mut params = vec![("q", token)];
    if !geo.is_empty() {
        params.push(("geo", geo));
    }
    params.push(("date", timeframe));

    Url::parse_with_params(EXPLORE_URL, &params)
        .map(|u| u.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(region: &str) -> WorkItem {
        WorkItem {
            region_code: region.to_string(),
            region_name: "Somewhere".to_string(),
            term: "apk".to_string(),
            timeframe: "now 1-d".to_string(),
        }
    }

    #[test]
    fn test_worldwide_maps_to_empty_geo() {
        assert_eq!(item("WW").geo(), "");
        assert_eq!(item("IN").geo(), "IN");
    }

    #[test]
    fn test_data_type_serializes_with_snake_case_names() {
        let json = serde_json::to_string(&DataType::QueryRising).unwrap();
        assert_eq!(json, "\"query_rising\"");
        assert_eq!(DataType::TopicTop.sheet_name(), "Related_Topics_Top");
    }

    #[test]
    fn test_only_full_mode_includes_topics() {
        assert!(!DataMode::Reduced.includes_topics());
        assert!(DataMode::Full.includes_topics());
        assert_eq!(DataMode::default(), DataMode::Reduced);
    }

    #[test]
    fn test_record_link_encodes_query_and_geo() {
        let raw = RawItem {
            data_type: DataType::QueryTop,
            title: "whatsapp apk".to_string(),
            value: "100".to_string(),
            link_token: Some("whatsapp apk".to_string()),
        };
        let record = TrendRecord::from_raw(&item("IN"), raw, "2026-01-22 10:00:00");
        assert_eq!(
            record.link,
            "https://trends.google.com/trends/explore?q=whatsapp+apk&geo=IN&date=now+1-d"
        );
        assert_eq!(record.region_code, "IN");
    }

    #[test]
    fn test_worldwide_link_omits_geo_and_topic_without_id_has_no_link() {
        assert_eq!(
            explore_link("/m/0k2kj", "", "now 1-d"),
            "https://trends.google.com/trends/explore?q=%2Fm%2F0k2kj&date=now+1-d"
        );

        let raw = RawItem {
            data_type: DataType::TopicRising,
            title: "Game mods".to_string(),
            value: "Breakout".to_string(),
            link_token: None,
        };
        let record = TrendRecord::from_raw(&item("WW"), raw, "2026-01-22 10:00:00");
        assert!(record.link.is_empty());
    }
}
