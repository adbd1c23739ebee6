//! `query_apm_metrics`: timeseries for one logical APM metric.

use super::Toolkit;
use crate::backend::MetricPoint;
use crate::core::retry::retry_with_config;
use crate::core::{
    ApmMetric, LensError, MetricAggregation, Result, ServiceName, TimeRange, ToolResult,
};
use crate::resolve::discovery::{
    metric_scope, DiscoveredMetrics, ERROR_PATTERNS, LATENCY_PATTERNS, THROUGHPUT_PATTERNS,
};
use serde::{Deserialize, Serialize};

/// Input record for `query_apm_metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApmMetricsInput {
    pub service: String,
    pub metric: ApmMetric,
    pub time_range: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub aggregation: Option<MetricAggregation>,
}

/// Summary statistics over the returned points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub latest: f64,
}

impl MetricSummary {
    fn from_points(points: &[MetricPoint]) -> Self {
        if points.is_empty() {
            return MetricSummary::default();
        }
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        MetricSummary {
            count: values.len(),
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            avg: values.iter().sum::<f64>() / values.len() as f64,
            latest: values[values.len() - 1],
        }
    }
}

/// Result payload for `query_apm_metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApmMetricsData {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub metric: ApmMetric,
    /// The backend query the result was computed from
    pub query: String,
    pub points: Vec<MetricPoint>,
    pub summary: MetricSummary,
}

impl Toolkit {
    /// Query latency, throughput or error rate for a service over a window
    pub async fn query_apm_metrics(&self, input: ApmMetricsInput) -> ToolResult<ApmMetricsData> {
        let key = match self.fingerprint("query_apm_metrics", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<ApmMetricsData>(&key) {
            return ToolResult::ok_cached(data);
        }

        let range = match self.resolve_range(Some(&input.time_range)) {
            Ok(range) => range,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        match self.query_apm_metrics_inner(&input, range).await {
            Ok(data) => {
                let ttl = self.config.cache.ttl_for_window(range.duration_ms());
                self.cache_store(&key, &data, ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(
                    service = input.service,
                    category = e.category(),
                    "query_apm_metrics failed: {}",
                    e
                );
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn query_apm_metrics_inner(
        &self,
        input: &ApmMetricsInput,
        range: TimeRange,
    ) -> Result<ApmMetricsData> {
        let service = self.service(&input.service)?;
        let environment = input.environment.as_deref();

        let discovered = self
            .probe
            .discover(&service, environment, range)
            .await?
            .ok_or_else(|| LensError::Discovery {
                service: service.as_str().to_string(),
                tried: [LATENCY_PATTERNS, THROUGHPUT_PATTERNS, ERROR_PATTERNS]
                    .concat()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })?;

        let (query, points) = match input.metric {
            ApmMetric::Latency => {
                self.latency_series(&service, environment, &discovered, input.aggregation, range)
                    .await?
            },
            ApmMetric::Throughput => {
                self.throughput_series(&service, environment, &discovered, range).await?
            },
            ApmMetric::ErrorRate => {
                self.error_rate_series(&service, environment, &discovered, range).await?
            },
        };

        let summary = MetricSummary::from_points(&points);
        Ok(ApmMetricsData {
            service: service.into_inner(),
            environment: input.environment.clone(),
            metric: input.metric,
            query,
            points,
            summary,
        })
    }

    async fn latency_series(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        discovered: &DiscoveredMetrics,
        aggregation: Option<MetricAggregation>,
        range: TimeRange,
    ) -> Result<(String, Vec<MetricPoint>)> {
        let metric = discovered.latency.as_deref().ok_or_else(|| {
            LensError::InsufficientData {
                service: service.as_str().to_string(),
                detail: format!(
                    "no latency metric discovered (found: {:?})",
                    discovered_kinds(discovered)
                ),
            }
        })?;

        let agg = aggregation.unwrap_or(MetricAggregation::Avg);
        let query = format!("{}:{}{}", agg.as_str(), metric, metric_scope(service, environment));
        let points = self.fetch_points(&query, range).await?;
        Ok((query, points))
    }

    async fn throughput_series(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        discovered: &DiscoveredMetrics,
        range: TimeRange,
    ) -> Result<(String, Vec<MetricPoint>)> {
        let metric = discovered.throughput.as_deref().ok_or_else(|| {
            LensError::InsufficientData {
                service: service.as_str().to_string(),
                detail: format!(
                    "no throughput metric discovered (found: {:?})",
                    discovered_kinds(discovered)
                ),
            }
        })?;

        let query = format!("sum:{}{}", metric, metric_scope(service, environment));
        let points = self.fetch_points(&query, range).await?;
        Ok((query, points))
    }

    /// Error rate needs both the errors and throughput metrics; the two
    /// series are joined positionally and rendered as a percentage.
    async fn error_rate_series(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        discovered: &DiscoveredMetrics,
        range: TimeRange,
    ) -> Result<(String, Vec<MetricPoint>)> {
        let (errors, hits) = match (&discovered.errors, &discovered.throughput) {
            (Some(errors), Some(hits)) => (errors.clone(), hits.clone()),
            _ => {
                return Err(LensError::InsufficientData {
                    service: service.as_str().to_string(),
                    detail: format!(
                        "error rate needs both errors and throughput metrics (found: {:?})",
                        discovered_kinds(discovered)
                    ),
                })
            },
        };

        let scope = metric_scope(service, environment);
        let error_points = self.fetch_points(&format!("sum:{}{}", errors, scope), range).await?;
        let hit_points = self.fetch_points(&format!("sum:{}{}", hits, scope), range).await?;

        let points = error_points
            .iter()
            .zip(hit_points.iter())
            .filter(|(_, hit)| hit.value > 0.0)
            .map(|(err, hit)| MetricPoint {
                timestamp_ms: err.timestamp_ms,
                value: 100.0 * err.value / hit.value,
            })
            .collect();

        let query = format!("(sum:{}{} / sum:{}{}) * 100", errors, scope, hits, scope);
        Ok((query, points))
    }

    /// Run one metric query through retry and flatten series to points
    async fn fetch_points(&self, query: &str, range: TimeRange) -> Result<Vec<MetricPoint>> {
        let response = retry_with_config(self.retry(), || async {
            self.backend.query_metrics(query, range).await
        })
        .await?;

        let mut points: Vec<MetricPoint> =
            response.series.into_iter().flat_map(|s| s.points).collect();
        points.sort_by_key(|p| p.timestamp_ms);
        Ok(points)
    }
}

fn discovered_kinds(discovered: &DiscoveredMetrics) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    if discovered.latency.is_some() {
        kinds.push("latency");
    }
    if discovered.throughput.is_some() {
        kinds.push("throughput");
    }
    if discovered.errors.is_some() {
        kinds.push("errors");
    }
    kinds
}
