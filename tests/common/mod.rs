//! Shared test fixtures: a scripted in-memory telemetry backend.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use spanlens::backend::{
    AggregateBucket, Compute, LogEntry, MetricPoint, MetricResponse, MetricSeries, Monitor,
    MonitorFilter, MonitorStatus, ServiceDefinition, SpanSummary, TelemetryBackend,
};
use spanlens::core::retry::RetryConfig;
use spanlens::core::{ConfigBuilder, LensError, Result, ServiceName, TimeRange, TraceSortBy};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted backend: responses are configured up front, every call is
/// recorded for assertions.
#[derive(Default)]
pub struct MockBackend {
    /// Metric names that return data from plain (ungrouped) queries
    pub metrics_with_data: Vec<String>,
    /// Series returned by grouped (`by {...}`) metric queries
    pub grouped_series: Vec<MetricSeries>,
    pub buckets: Vec<AggregateBucket>,
    pub monitors: Vec<Monitor>,
    pub logs: Vec<LogEntry>,
    pub spans: Vec<SpanSummary>,
    pub definition: Option<ServiceDefinition>,
    pub fail_metrics: bool,
    pub fail_aggregate: bool,
    pub fail_spans: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetryBackend for MockBackend {
    async fn query_metrics(&self, query: &str, _range: TimeRange) -> Result<MetricResponse> {
        self.record(format!("query_metrics:{}", query));
        if self.fail_metrics {
            return Err(LensError::transient("mock metric outage"));
        }
        if query.contains(" by {") {
            return Ok(MetricResponse {
                series: self.grouped_series.clone(),
            });
        }
        let matched = self
            .metrics_with_data
            .iter()
            .find(|metric| query.contains(metric.as_str()));
        match matched {
            Some(metric) => Ok(MetricResponse {
                series: vec![series(metric, "", &[(1_000, 5.0), (2_000, 10.0)])],
            }),
            None => Ok(MetricResponse::default()),
        }
    }

    async fn aggregate_spans(
        &self,
        filter_query: &str,
        _range: TimeRange,
        group_by: &str,
        computes: &[Compute],
    ) -> Result<Vec<AggregateBucket>> {
        self.record(format!(
            "aggregate_spans:{}:{}:{}",
            filter_query,
            group_by,
            computes.iter().map(|c| c.key()).collect::<Vec<_>>().join(",")
        ));
        if self.fail_aggregate {
            return Err(LensError::transient("mock aggregate outage"));
        }
        Ok(self.buckets.clone())
    }

    async fn search_logs(
        &self,
        query: &str,
        _range: TimeRange,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        self.record(format!("search_logs:{}:{}", query, limit));
        Ok(self.logs.clone())
    }

    async fn list_spans(
        &self,
        query: &str,
        _range: TimeRange,
        sort: TraceSortBy,
        limit: usize,
    ) -> Result<Vec<SpanSummary>> {
        self.record(format!("list_spans:{}:{:?}:{}", query, sort, limit));
        if self.fail_spans {
            return Err(LensError::transient("mock span outage"));
        }
        Ok(self.spans.clone())
    }

    async fn list_monitors(&self, filter: &MonitorFilter) -> Result<Vec<Monitor>> {
        self.record(format!("list_monitors:{:?}", filter.service));
        Ok(self.monitors.clone())
    }

    async fn service_definition(&self, service: &ServiceName) -> Result<Option<ServiceDefinition>> {
        self.record(format!("service_definition:{}", service));
        Ok(self.definition.clone())
    }
}

/// Retry settings with negligible backoff for tests
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    }
}

/// Toolkit configuration with negligible retry backoff
pub fn fast_config() -> spanlens::core::Config {
    let mut config = ConfigBuilder::new()
        .max_attempts(2)
        .initial_backoff(Duration::from_millis(1))
        .build()
        .unwrap();
    config.retry.jitter = false;
    config
}

pub fn series(metric: &str, scope: &str, points: &[(i64, f64)]) -> MetricSeries {
    MetricSeries {
        metric: metric.to_string(),
        scope: scope.to_string(),
        points: points
            .iter()
            .map(|(timestamp_ms, value)| MetricPoint {
                timestamp_ms: *timestamp_ms,
                value: *value,
            })
            .collect(),
    }
}

pub fn bucket(resource: &str, computes: &[(&str, f64)]) -> AggregateBucket {
    AggregateBucket {
        by: [("resource_name".to_string(), resource.to_string())].into(),
        computes: computes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

pub fn monitor(id: i64, name: &str, status: MonitorStatus) -> Monitor {
    Monitor {
        id,
        name: name.to_string(),
        status,
        monitor_type: Some("metric alert".to_string()),
        query: "avg(last_5m):errors > 10".to_string(),
        message: None,
        tags: vec!["service:checkout".to_string()],
    }
}

pub fn span(trace_id: &str, operation: &str, duration_ms: f64, is_error: bool) -> SpanSummary {
    SpanSummary {
        trace_id: trace_id.to_string(),
        span_id: format!("{}-span", trace_id),
        service: "checkout".to_string(),
        operation: operation.to_string(),
        resource: Some(operation.to_string()),
        start_ms: 1_700_000_000_000,
        duration_ms,
        is_error,
        http_status_code: if is_error { Some(500) } else { Some(200) },
    }
}

pub fn log(message: &str, status: &str) -> LogEntry {
    LogEntry {
        timestamp_ms: 1_700_000_000_000,
        status: Some(status.to_string()),
        message: message.to_string(),
        service: Some("checkout".to_string()),
        attributes: serde_json::Value::Null,
    }
}

pub fn range() -> TimeRange {
    TimeRange::new(1_700_000_000_000, 1_700_003_600_000).unwrap()
}
