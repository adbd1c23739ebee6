//! Two-strategy resolver for per-operation service metrics.
//!
//! Fast path: query a discovered pre-aggregated latency metric grouped by
//! resource. Cheap, but yields latency only. Fallback path: aggregate raw
//! entry spans on the fly, which is complete (counts, error rates, three
//! percentiles) but more expensive. Any fast-path failure or empty result
//! transitions to the fallback rather than surfacing an error.

use super::aggregation::parse_bucket;
use super::discovery::{metric_scope, MetricProbe};
use crate::backend::{Compute, TelemetryBackend};
use crate::core::retry::{retry_with_config, RetryConfig};
use crate::core::{
    DataSource, LensError, OperationMetrics, Result, ServiceName, TimeRange,
};
use crate::query::SpanQueryBuilder;
use std::sync::Arc;

/// Group-by facet holding the operation/resource name
const RESOURCE_FACET: &str = "resource_name";

/// Resolves per-operation metrics via fast path with spans fallback.
pub struct HybridOperationsResolver {
    backend: Arc<dyn TelemetryBackend>,
    probe: MetricProbe,
    retry: RetryConfig,
}

impl HybridOperationsResolver {
    /// Create a resolver over the injected backend
    pub fn new(backend: Arc<dyn TelemetryBackend>, retry: RetryConfig) -> Self {
        let probe = MetricProbe::new(backend.clone(), retry.clone());
        HybridOperationsResolver {
            backend,
            probe,
            retry,
        }
    }

    /// Resolve operation metrics for a service.
    ///
    /// Returns the records plus the strategy that produced them. When
    /// neither strategy yields data the result is an
    /// [`LensError::InsufficientData`] whose message names the condition;
    /// callers convert it into a failed tool result.
    pub async fn resolve(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        range: TimeRange,
    ) -> Result<(Vec<OperationMetrics>, DataSource)> {
        match self.fast_path(service, environment, range).await {
            Ok(operations) if !operations.is_empty() => {
                return Ok((operations, DataSource::TraceMetrics));
            },
            Ok(_) => {
                tracing::info!(
                    service = service.as_str(),
                    "fast path returned no series, falling back to span aggregation"
                );
            },
            Err(e) => {
                tracing::warn!(
                    service = service.as_str(),
                    category = e.category(),
                    "fast path failed, falling back to span aggregation: {}",
                    e
                );
            },
        }

        let operations = self.fallback_path(service, environment, range).await?;
        if operations.is_empty() {
            return Err(LensError::InsufficientData {
                service: service.as_str().to_string(),
                detail: "no APM data found in trace metrics or span aggregation".to_string(),
            });
        }
        Ok((operations, DataSource::SpansApi))
    }

    /// Trace-metrics strategy: discovered latency metric grouped by resource.
    ///
    /// Only latency is obtainable from this query shape; counts stay zero.
    async fn fast_path(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<OperationMetrics>> {
        // An errors-only discovery is not usable for operation listing.
        let discovered = match self.probe.discover(service, environment, range).await? {
            Some(discovered) if discovered.is_usable() => discovered,
            _ => return Ok(Vec::new()),
        };
        let latency_metric = match &discovered.latency {
            Some(metric) => metric.clone(),
            None => return Ok(Vec::new()),
        };

        let query = format!(
            "p95:{}{} by {{{}}}",
            latency_metric,
            metric_scope(service, environment),
            RESOURCE_FACET
        );
        let response = retry_with_config(&self.retry, || async {
            self.backend.query_metrics(&query, range).await
        })
        .await?;

        Ok(response
            .series
            .iter()
            .filter(|series| !series.points.is_empty())
            .map(|series| {
                let operation = series
                    .scope_tag(RESOURCE_FACET)
                    .unwrap_or("unknown")
                    .to_string();
                let mut metrics = OperationMetrics::empty(operation);
                metrics.p95_latency_ms = series.mean().unwrap_or(0.0);
                metrics
            })
            .collect())
    }

    /// Spans-aggregation strategy: complete per-operation records from
    /// entry spans.
    async fn fallback_path(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<OperationMetrics>> {
        let mut builder = SpanQueryBuilder::new(service.clone()).entry_spans_only();
        if let Some(env) = environment {
            builder = builder.environment(env);
        }
        let filter_query = builder.build();

        let computes = [
            Compute::Count,
            Compute::ErrorCount,
            Compute::Percentile(50),
            Compute::Percentile(95),
            Compute::Percentile(99),
        ];
        let buckets = retry_with_config(&self.retry, || async {
            self.backend
                .aggregate_spans(&filter_query, range, RESOURCE_FACET, &computes)
                .await
        })
        .await?;

        let mut operations: Vec<OperationMetrics> = buckets
            .iter()
            .map(|bucket| parse_bucket(bucket, RESOURCE_FACET))
            .collect();
        operations.sort_by(|a, b| {
            b.request_count
                .cmp(&a.request_count)
                .then_with(|| a.operation.cmp(&b.operation))
        });
        Ok(operations)
    }
}
