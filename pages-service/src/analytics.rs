//! Per-minute event counters and their aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::store::{Item, ItemKey, KeyValueStore, ScanFilter, ScanRequest, StoreError};

pub const DEFAULT_EVENT_LIMIT: usize = 100;
pub const MAX_EVENT_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsData {
    pub event: String,
    pub timestamp: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Group {
    #[default]
    Minute,
    Hour,
    Day,
}

impl Group {
    pub fn parse(raw: Option<&str>) -> Result<Self, AnalyticsError> {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("minute") => Ok(Group::Minute),
            Some("hour") => Ok(Group::Hour),
            Some("day") => Ok(Group::Day),
            Some(other) => Err(AnalyticsError::InvalidGroup(other.to_string())),
        }
    }

    fn seconds(self) -> i64 {
        match self {
            Group::Minute => 60,
            Group::Hour => 3_600,
            Group::Day => 86_400,
        }
    }

    pub fn bucket(self, timestamp: i64) -> i64 {
        timestamp - timestamp.rem_euclid(self.seconds())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub oldest: Option<i64>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EventQuery {
    fn filter(&self) -> Result<ScanFilter, AnalyticsError> {
        let name = self.event_name.as_deref().filter(|name| !name.is_empty());
        let kind = self.event_type.as_deref().filter(|kind| !kind.is_empty());
        let selector = match (name, kind) {
            (Some(name), _) => ScanFilter::eq("event", name),
            (None, Some(kind)) => ScanFilter::contains("event", kind),
            (None, None) => return Err(AnalyticsError::MissingSelector),
        };
        let mut filters = vec![selector];
        if let Some(oldest) = self.oldest {
            filters.push(ScanFilter::gte("timestamp", oldest));
        }
        Ok(ScanFilter::all_of(filters))
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("event_name or event_type is required")]
    MissingSelector,
    #[error("event name must not be empty")]
    EmptyEvent,
    #[error("unsupported group '{0}', expected minute, hour or day")]
    InvalidGroup(String),
    #[error("analytics store failure: {0}")]
    Store(#[from] StoreError),
    #[error("corrupt analytics record: {0}")]
    Corrupt(String),
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::MissingSelector => {
                ApiError::bad_request("missing_event_selector", err.to_string())
            }
            AnalyticsError::EmptyEvent => ApiError::bad_request("invalid_event", err.to_string()),
            AnalyticsError::InvalidGroup(_) => {
                ApiError::bad_request("invalid_group", err.to_string())
            }
            other => ApiError::internal(other),
        }
    }
}

pub fn clamp_event_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT)
}

#[derive(Clone)]
pub struct AnalyticsRepository {
    store: Arc<dyn KeyValueStore>,
    table: String,
}

impl AnalyticsRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Counts one occurrence of `event` in the current minute.
    pub async fn log_event(&self, event: &str) -> Result<AnalyticsData, AnalyticsError> {
        let minute = Group::Minute.bucket(Utc::now().timestamp());
        self.log_event_at(event, minute).await
    }

    pub async fn log_event_at(
        &self,
        event: &str,
        timestamp: i64,
    ) -> Result<AnalyticsData, AnalyticsError> {
        if event.is_empty() {
            return Err(AnalyticsError::EmptyEvent);
        }
        let mut seed = Item::new();
        seed.insert("event".into(), Value::String(event.to_string()));
        seed.insert("timestamp".into(), Value::from(timestamp));
        let count = self
            .store
            .increment(
                &self.table,
                ItemKey::new(event, timestamp),
                seed,
                "count",
                1,
            )
            .await?;
        debug!(event, timestamp, count, "event logged");
        Ok(AnalyticsData {
            event: event.to_string(),
            timestamp,
            count,
        })
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<AnalyticsData>, AnalyticsError> {
        let page = self
            .store
            .scan(&self.table, ScanRequest::new(ScanFilter::All).limit(limit))
            .await?;
        page.items.into_iter().map(decode).collect()
    }

    /// Sums matching counters into `(event, bucket)` totals, oldest first.
    pub async fn event_analytics(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<AnalyticsData>, AnalyticsError> {
        let filter = query.filter()?;
        let group = Group::parse(query.group.as_deref())?;
        let limit = clamp_event_limit(query.limit);
        let page = self
            .store
            .scan(&self.table, ScanRequest::new(filter).limit(limit))
            .await?;

        let mut buckets: BTreeMap<(i64, String), i64> = BTreeMap::new();
        for item in page.items {
            let data = decode(item)?;
            *buckets
                .entry((group.bucket(data.timestamp), data.event))
                .or_default() += data.count;
        }
        Ok(buckets
            .into_iter()
            .map(|((timestamp, event), count)| AnalyticsData {
                event,
                timestamp,
                count,
            })
            .collect())
    }
}

fn decode(item: Item) -> Result<AnalyticsData, AnalyticsError> {
    serde_json::from_value(Value::Object(item))
        .map_err(|err| AnalyticsError::Corrupt(err.to_string()))
}
