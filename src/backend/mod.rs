//! Boundary to the remote telemetry backend.
//!
//! The core never talks to the network directly: every resolver receives
//! an injected `Arc<dyn TelemetryBackend>`. The shipped implementation is
//! [`http::HttpBackend`]; tests substitute scripted fakes.

use crate::core::{Result, ServiceName, TimeRange, TraceSortBy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub mod auth;
pub mod http;

/// A single timestamped metric value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// One metric series, optionally scoped by a tag set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Metric identifier (e.g. `trace.express.request.duration`)
    pub metric: String,
    /// Comma-separated `key:value` tag scope, empty when unscoped
    pub scope: String,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    /// Extract one tag value from the scope string
    pub fn scope_tag(&self, key: &str) -> Option<&str> {
        self.scope
            .split(',')
            .filter_map(|pair| pair.split_once(':'))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Mean of the series values, `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.value).sum::<f64>() / self.points.len() as f64)
    }
}

/// Response of a timeseries metric query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResponse {
    pub series: Vec<MetricSeries>,
}

impl MetricResponse {
    /// True if any series carries at least one data point
    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }
}

/// Computed value requested from a span aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compute {
    /// Request count
    Count,
    /// Error count
    ErrorCount,
    /// Duration percentile (e.g. 50, 95, 99)
    Percentile(u8),
}

impl Compute {
    /// Key under which the computed value appears in a bucket
    pub fn key(&self) -> String {
        match self {
            Compute::Count => "count".to_string(),
            Compute::ErrorCount => "error_count".to_string(),
            Compute::Percentile(p) => format!("p{}", p),
        }
    }
}

/// One grouped-by bucket of a span aggregation response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    /// Group-by tag values (e.g. `resource_name` -> `GET /cart`)
    pub by: BTreeMap<String, String>,
    /// Named computed values; partially populated buckets are legal
    pub computes: BTreeMap<String, f64>,
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: i64,
    /// Log level/status tag (`info`, `error`, ...), when present
    pub status: Option<String>,
    pub message: String,
    pub service: Option<String>,
    /// Remaining structured attributes, passed through untouched
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Monitor alerting state, ordered by severity for sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    #[serde(alias = "Alert")]
    Alert,
    #[serde(alias = "Warn")]
    Warn,
    #[serde(alias = "No Data", alias = "No+Data")]
    NoData,
    #[serde(alias = "OK", alias = "Ok")]
    Ok,
    #[serde(other)]
    Unknown,
}

impl MonitorStatus {
    /// Severity rank: lower sorts first
    pub fn rank(&self) -> u8 {
        match self {
            MonitorStatus::Alert => 0,
            MonitorStatus::Warn => 1,
            MonitorStatus::NoData => 2,
            MonitorStatus::Ok => 3,
            MonitorStatus::Unknown => 4,
        }
    }

    /// Stable lowercase name used in grouped summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Alert => "alert",
            MonitorStatus::Warn => "warn",
            MonitorStatus::NoData => "no_data",
            MonitorStatus::Ok => "ok",
            MonitorStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for MonitorStatus {
    type Err = crate::core::LensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alert" => Ok(MonitorStatus::Alert),
            "warn" => Ok(MonitorStatus::Warn),
            "no_data" | "no data" => Ok(MonitorStatus::NoData),
            "ok" => Ok(MonitorStatus::Ok),
            other => Err(crate::core::LensError::validation(format!(
                "unknown monitor status '{}': expected alert, warn, no_data or ok",
                other
            ))),
        }
    }
}

/// One alerting monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub status: MonitorStatus,
    pub monitor_type: Option<String>,
    pub query: String,
    pub message: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Server-side monitor listing filter
#[derive(Debug, Clone, Default)]
pub struct MonitorFilter {
    pub service: Option<String>,
    pub tags: Vec<String>,
    pub monitor_type: Option<String>,
}

/// Summary of one span returned by a trace listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSummary {
    pub trace_id: String,
    pub span_id: String,
    pub service: String,
    pub operation: String,
    pub resource: Option<String>,
    pub start_ms: i64,
    pub duration_ms: f64,
    pub is_error: bool,
    pub http_status_code: Option<u16>,
}

/// A named link attached to a service definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLink {
    pub name: String,
    pub url: String,
}

/// Ownership/metadata record for a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub service: String,
    pub team: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub links: Vec<ServiceLink>,
}

/// Authenticated telemetry backend operations consumed by the resolvers.
///
/// Implementations own transport, auth headers and response decoding;
/// they surface failures using the crate error taxonomy so the retry
/// wrapper can classify them.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Run a timeseries metric query over the window
    async fn query_metrics(&self, query: &str, range: TimeRange) -> Result<MetricResponse>;

    /// Aggregate spans matching `filter_query`, grouped by one tag
    async fn aggregate_spans(
        &self,
        filter_query: &str,
        range: TimeRange,
        group_by: &str,
        computes: &[Compute],
    ) -> Result<Vec<AggregateBucket>>;

    /// Search log events matching the query
    async fn search_logs(&self, query: &str, range: TimeRange, limit: usize)
        -> Result<Vec<LogEntry>>;

    /// List spans matching the filter query
    async fn list_spans(
        &self,
        query: &str,
        range: TimeRange,
        sort: TraceSortBy,
        limit: usize,
    ) -> Result<Vec<SpanSummary>>;

    /// List monitors matching the filter
    async fn list_monitors(&self, filter: &MonitorFilter) -> Result<Vec<Monitor>>;

    /// Fetch the service definition, `None` when the service has none
    async fn service_definition(&self, service: &ServiceName) -> Result<Option<ServiceDefinition>>;
}
