use crate::core::error::{LensError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SERVICE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid service name regex"));

static RELATIVE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([mhd])$").expect("valid time range regex"));

/// Service name identifier, validated against the backend tag grammar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new ServiceName after validation
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LensError::validation("service name cannot be empty"));
        }
        if !SERVICE_NAME_RE.is_match(&name) {
            return Err(LensError::validation(format!(
                "service name '{}' must match [A-Za-z0-9_-]+",
                name
            )));
        }
        Ok(ServiceName(name))
    }

    /// Returns the string representation of the service name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Absolute query window in epoch milliseconds.
///
/// Constructed either from explicit bounds or by resolving a relative
/// expression (`15m`, `4h`, `7d`) against a wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start, epoch ms
    pub from_ms: i64,
    /// Window end, epoch ms
    pub to_ms: i64,
}

impl TimeRange {
    /// Creates a time range, rejecting empty or inverted windows
    pub fn new(from_ms: i64, to_ms: i64) -> Result<Self> {
        if to_ms <= from_ms {
            return Err(LensError::validation(format!(
                "time range end ({}) must be after start ({})",
                to_ms, from_ms
            )));
        }
        Ok(TimeRange { from_ms, to_ms })
    }

    /// Resolves a relative range expression (`<integer>(m|h|d)`) into an
    /// absolute window ending at `now_ms`.
    ///
    /// Deterministic given the clock reading, which keeps it testable.
    pub fn parse_relative(expr: &str, now_ms: i64) -> Result<Self> {
        let caps = RELATIVE_RANGE_RE.captures(expr.trim()).ok_or_else(|| {
            LensError::validation(format!(
                "invalid time range '{}': expected <integer>(m|h|d), e.g. \"1h\"",
                expr
            ))
        })?;

        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| LensError::validation(format!("time range amount out of range: '{}'", expr)))?;
        if amount == 0 {
            return Err(LensError::validation("time range must be greater than zero"));
        }

        // The regex only admits m/h/d, but reject anything else anyway.
        let unit_ms: i64 = match &caps[2] {
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            other => {
                return Err(LensError::validation(format!("unknown time range unit '{}'", other)))
            },
        };

        // Checked arithmetic: an absurd amount must fail validation, not
        // wrap into a garbage window. A window reaching before the epoch
        // is equally nonsensical for telemetry queries.
        let from_ms = amount
            .checked_mul(unit_ms)
            .and_then(|window_ms| now_ms.checked_sub(window_ms))
            .filter(|from_ms| *from_ms >= 0)
            .ok_or_else(|| {
                LensError::validation(format!("time range '{}' is too large", expr))
            })?;

        TimeRange::new(from_ms, now_ms)
    }

    /// Window length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.to_ms - self.from_ms
    }
}

/// Uniform response envelope returned by every tool function.
///
/// `success: true` implies `data` present and `error` absent; failures
/// carry only a message. Tools never surface raw errors to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl<T> ToolResult<T> {
    /// Successful result computed fresh from the backend
    pub fn ok(data: T) -> Self {
        ToolResult {
            success: true,
            data: Some(data),
            error: None,
            cached: None,
        }
    }

    /// Successful result served from the cache
    pub fn ok_cached(data: T) -> Self {
        ToolResult {
            success: true,
            data: Some(data),
            error: None,
            cached: Some(true),
        }
    }

    /// Failed result carrying only a diagnostic message
    pub fn failure<S: Into<String>>(message: S) -> Self {
        ToolResult {
            success: false,
            data: None,
            error: Some(message.into()),
            cached: None,
        }
    }
}

/// Which logical APM metric a tool call is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApmMetric {
    Latency,
    Throughput,
    ErrorRate,
}

impl ApmMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApmMetric::Latency => "latency",
            ApmMetric::Throughput => "throughput",
            ApmMetric::ErrorRate => "error_rate",
        }
    }
}

/// Aggregation applied to a metric query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricAggregation {
    Avg,
    P50,
    P95,
    P99,
}

impl MetricAggregation {
    /// Backend query prefix for this aggregation
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricAggregation::Avg => "avg",
            MetricAggregation::P50 => "p50",
            MetricAggregation::P95 => "p95",
            MetricAggregation::P99 => "p99",
        }
    }
}

/// Span status predicate accepted by the trace tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatusFilter {
    Ok,
    Error,
}

impl SpanStatusFilter {
    pub fn as_tag(&self) -> &'static str {
        match self {
            SpanStatusFilter::Ok => "ok",
            SpanStatusFilter::Error => "error",
        }
    }
}

/// Sort order for trace listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceSortBy {
    Duration,
    Timestamp,
}

/// Which strategy produced an operations result.
///
/// Trace-metrics results carry latency only; spans-api results are
/// complete per-operation records. Consumers can branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "trace-metrics")]
    TraceMetrics,
    #[serde(rename = "spans-api")]
    SpansApi,
}

/// Normalized per-endpoint statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// Operation / resource name (e.g. `GET /api/checkout`)
    pub operation: String,
    pub request_count: u64,
    pub error_count: u64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    /// Error percentage (0-100), rounded to 2 decimals
    pub error_rate: f64,
}

impl OperationMetrics {
    /// Empty record for a named operation; counts and latencies zeroed
    pub fn empty(operation: String) -> Self {
        OperationMetrics {
            operation,
            request_count: 0,
            error_count: 0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            error_rate: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_validation() {
        assert!(ServiceName::new("checkout-api_v2").is_ok());
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new("bad service").is_err());
        assert!(ServiceName::new("svc:prod").is_err());
    }

    #[test]
    fn test_parse_relative_day() {
        let now = 1_700_000_000_000;
        let range = TimeRange::parse_relative("24h", now).unwrap();
        assert_eq!(range.to_ms, now);
        assert_eq!(range.duration_ms(), 86_400_000);
    }

    #[test]
    fn test_parse_relative_units() {
        let now = 1_700_000_000_000;
        assert_eq!(TimeRange::parse_relative("15m", now).unwrap().duration_ms(), 900_000);
        assert_eq!(
            TimeRange::parse_relative("7d", now).unwrap().duration_ms(),
            7 * 86_400_000
        );
    }

    #[test]
    fn test_parse_relative_rejects_garbage() {
        let now = 1_700_000_000_000;
        assert!(TimeRange::parse_relative("bogus", now).is_err());
        assert!(TimeRange::parse_relative("1w", now).is_err());
        assert!(TimeRange::parse_relative("h", now).is_err());
        assert!(TimeRange::parse_relative("0m", now).is_err());
        assert!(TimeRange::parse_relative("-5m", now).is_err());
    }

    #[test]
    fn test_parse_relative_rejects_oversized_window() {
        let now = 1_700_000_000_000;
        // Grammar-valid but arithmetically absurd amounts must fail
        // validation instead of wrapping.
        assert!(TimeRange::parse_relative("99999999999d", now).is_err());
        assert!(TimeRange::parse_relative("9999999999999999999m", now).is_err());
        // A large but representable window still parses.
        assert!(TimeRange::parse_relative("3650d", now).is_ok());
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        assert!(TimeRange::new(100, 100).is_err());
        assert!(TimeRange::new(200, 100).is_err());
        assert!(TimeRange::new(100, 200).is_ok());
    }

    #[test]
    fn test_tool_result_envelope() {
        let ok: ToolResult<u32> = ToolResult::ok(7);
        assert!(ok.success);
        assert_eq!(ok.data, Some(7));
        assert!(ok.error.is_none());

        let failed: ToolResult<u32> = ToolResult::failure("backend down");
        assert!(!failed.success);
        assert!(failed.data.is_none());
        assert_eq!(failed.error.as_deref(), Some("backend down"));

        let json = serde_json::to_value(&failed).unwrap();
        assert!(json.get("data").is_none());
        assert!(json.get("cached").is_none());
    }

    #[test]
    fn test_data_source_wire_names() {
        assert_eq!(serde_json::to_string(&DataSource::TraceMetrics).unwrap(), "\"trace-metrics\"");
        assert_eq!(serde_json::to_string(&DataSource::SpansApi).unwrap(), "\"spans-api\"");
    }
}
