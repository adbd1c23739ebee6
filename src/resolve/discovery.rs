//! Metric-existence discovery probe.
//!
//! The backend does not guarantee one canonical metric-naming convention
//! across instrumentation versions, so each metric kind (latency,
//! throughput, errors) is probed against a ranked list of historically
//! used names. Kinds are independent: a service may have latency and
//! throughput discovered but no errors metric, and that partial result
//! is still usable.

use crate::backend::TelemetryBackend;
use crate::core::retry::{retry_with_config, RetryConfig};
use crate::core::{LensError, Result, ServiceName, TimeRange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request-duration metric names, most common convention first
pub const LATENCY_PATTERNS: &[&str] = &[
    "trace.http.request.duration",
    "trace.express.request.duration",
    "trace.web.request.duration",
    "trace.servlet.request.duration",
    "trace.flask.request.duration",
    "trace.grpc.request.duration",
];

/// Request-count metric names
pub const THROUGHPUT_PATTERNS: &[&str] = &[
    "trace.http.request.hits",
    "trace.express.request.hits",
    "trace.web.request.hits",
    "trace.servlet.request.hits",
    "trace.flask.request.hits",
    "trace.grpc.request.hits",
];

/// Request-error metric names
pub const ERROR_PATTERNS: &[&str] = &[
    "trace.http.request.errors",
    "trace.express.request.errors",
    "trace.web.request.errors",
    "trace.servlet.request.errors",
    "trace.flask.request.errors",
    "trace.grpc.request.errors",
];

/// Outcome of probing one service for pre-aggregated trace metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredMetrics {
    pub service: String,
    /// First latency metric that returned data
    pub latency: Option<String>,
    /// First throughput metric that returned data
    pub throughput: Option<String>,
    /// First errors metric that returned data
    pub errors: Option<String>,
    /// Every metric name probed, for diagnostics
    pub tried: Vec<String>,
}

impl DiscoveredMetrics {
    /// A discovery is usable when latency or throughput was found
    pub fn is_usable(&self) -> bool {
        self.latency.is_some() || self.throughput.is_some()
    }
}

/// Render the tag scope filter for a probe or metric query
pub fn metric_scope(service: &ServiceName, environment: Option<&str>) -> String {
    match environment {
        Some(env) => format!("{{service:{},env:{}}}", service.as_str(), env),
        None => format!("{{service:{}}}", service.as_str()),
    }
}

/// Probes candidate metric names and reports which ones hold data.
pub struct MetricProbe {
    backend: Arc<dyn TelemetryBackend>,
    retry: RetryConfig,
}

impl MetricProbe {
    /// Create a probe over the injected backend
    pub fn new(backend: Arc<dyn TelemetryBackend>, retry: RetryConfig) -> Self {
        MetricProbe { backend, retry }
    }

    /// Probe all three metric kinds for a service.
    ///
    /// Returns `Ok(None)` when no kind matched any data. Auth failures
    /// propagate; other per-template failures are logged and treated as
    /// "no data" so one flaky query cannot sink the whole discovery.
    pub async fn discover(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        range: TimeRange,
    ) -> Result<Option<DiscoveredMetrics>> {
        let scope = metric_scope(service, environment);
        let mut tried = Vec::new();

        let latency = self.probe_kind(LATENCY_PATTERNS, &scope, range, &mut tried).await?;
        let throughput = self
            .probe_kind(THROUGHPUT_PATTERNS, &scope, range, &mut tried)
            .await?;
        let errors = self.probe_kind(ERROR_PATTERNS, &scope, range, &mut tried).await?;

        if latency.is_none() && throughput.is_none() && errors.is_none() {
            tracing::info!(
                service = service.as_str(),
                patterns = tried.len(),
                "no trace metrics discovered"
            );
            return Ok(None);
        }

        Ok(Some(DiscoveredMetrics {
            service: service.as_str().to_string(),
            latency,
            throughput,
            errors,
            tried,
        }))
    }

    /// Try each candidate in rank order; first one with data wins
    async fn probe_kind(
        &self,
        patterns: &[&str],
        scope: &str,
        range: TimeRange,
        tried: &mut Vec<String>,
    ) -> Result<Option<String>> {
        for pattern in patterns {
            tried.push(pattern.to_string());
            let query = format!("avg:{}{}", pattern, scope);

            let probed = retry_with_config(&self.retry, || async {
                self.backend.query_metrics(&query, range).await
            })
            .await;

            match probed {
                Ok(response) if response.has_data() => {
                    tracing::debug!(metric = pattern, "metric discovered");
                    return Ok(Some(pattern.to_string()));
                },
                Ok(_) => {},
                Err(e @ LensError::Auth(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        metric = pattern,
                        category = e.category(),
                        "probe query failed, treating as no data: {}",
                        e
                    );
                },
            }
        }
        Ok(None)
    }
}
