//! `get_service_health`: one-shot health verdict for a service.
//!
//! Fans out four independent queries (errors, latency, throughput,
//! monitors) concurrently and joins them. Additional context (recent
//! error traces for degraded services, the service definition) is
//! gathered best-effort: those calls can fail without failing the check.

use super::Toolkit;
use crate::backend::{
    Compute, Monitor, MonitorFilter, MonitorStatus, ServiceDefinition, SpanSummary,
};
use crate::core::retry::retry_with_config;
use crate::core::{
    LensError, Result, ServiceName, SpanStatusFilter, TimeRange, ToolResult, TraceSortBy,
};
use crate::query::SpanQueryBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input record for `get_service_health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthInput {
    pub service: String,
    #[serde(default)]
    pub environment: Option<String>,
}

/// Overall health verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
}

/// Monitor counts grouped by alerting state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorCounts {
    pub total: usize,
    pub alert: usize,
    pub warn: usize,
    pub ok: usize,
    pub no_data: usize,
}

impl MonitorCounts {
    fn from_monitors(monitors: &[Monitor]) -> Self {
        let mut counts = MonitorCounts {
            total: monitors.len(),
            ..MonitorCounts::default()
        };
        for monitor in monitors {
            match monitor.status {
                MonitorStatus::Alert => counts.alert += 1,
                MonitorStatus::Warn => counts.warn += 1,
                MonitorStatus::Ok => counts.ok += 1,
                MonitorStatus::NoData => counts.no_data += 1,
                MonitorStatus::Unknown => {},
            }
        }
        counts
    }
}

/// Result payload for `get_service_health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub status: HealthState,
    /// Error percentage over the last hour, when measurable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    /// Worst per-operation p95 over the last hour, when measurable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<f64>,
    pub monitors: MonitorCounts,
    /// Sampled error traces; empty when healthy or the sample failed
    pub recent_errors: Vec<SpanSummary>,
    /// Ownership metadata when the service has a definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<ServiceDefinition>,
}

impl Toolkit {
    /// Assess the current health of a service
    pub async fn get_service_health(&self, input: ServiceHealthInput) -> ToolResult<HealthData> {
        let key = match self.fingerprint("get_service_health", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<HealthData>(&key) {
            return ToolResult::ok_cached(data);
        }

        match self.get_service_health_inner(&input).await {
            Ok(data) => {
                self.cache_store(&key, &data, self.config.cache.status_ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(
                    service = input.service,
                    category = e.category(),
                    "get_service_health failed: {}",
                    e
                );
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn get_service_health_inner(&self, input: &ServiceHealthInput) -> Result<HealthData> {
        let service = self.service(&input.service)?;
        let environment = input.environment.as_deref();
        let range = self.resolve_range(None)?;

        let mut builder = SpanQueryBuilder::new(service.clone()).entry_spans_only();
        if let Some(env) = environment {
            builder = builder.environment(env);
        }
        let filter_query = builder.build();

        let errors_fut = self.aggregate_totals(&filter_query, range, &[Compute::Count, Compute::ErrorCount]);
        let latency_fut = self.aggregate_totals(&filter_query, range, &[Compute::Percentile(95)]);
        let throughput_fut = self.aggregate_totals(&filter_query, range, &[Compute::Count]);
        let monitors_fut = self.fetch_monitors(&service);

        let (errors, latency, throughput, monitors) =
            tokio::join!(errors_fut, latency_fut, throughput_fut, monitors_fut);

        let errors = discard_err("error totals", errors);
        let latency = discard_err("latency totals", latency);
        let throughput = discard_err("throughput totals", throughput);
        let monitors = discard_err("monitor list", monitors);

        if errors.is_none() && latency.is_none() && throughput.is_none() && monitors.is_none() {
            return Err(LensError::transient(format!(
                "unable to assess health of '{}': all health queries failed",
                service.as_str()
            )));
        }

        let error_rate = errors.as_ref().and_then(|totals| {
            let count = totals.get("count").copied().unwrap_or(0.0);
            let error_count = totals.get("error_count").copied()?;
            if count > 0.0 {
                Some(100.0 * error_count / count)
            } else {
                None
            }
        });
        let p95_latency_ms = latency.as_ref().and_then(|totals| totals.get("p95").copied());
        let requests_per_minute = throughput.as_ref().and_then(|totals| {
            let count = totals.get("count").copied()?;
            Some(count / (range.duration_ms() as f64 / 60_000.0))
        });

        let monitors = monitors.unwrap_or_default();
        let monitor_counts = MonitorCounts::from_monitors(&monitors);

        let status = self.health_state(error_rate, p95_latency_ms, &monitor_counts);

        // Best effort from here on: neither sample may fail the check.
        let recent_errors = if status != HealthState::Healthy {
            self.recent_error_traces(&service, environment, range).await
        } else {
            Vec::new()
        };
        let definition = self.definition_best_effort(&service).await;

        Ok(HealthData {
            service: service.into_inner(),
            environment: input.environment.clone(),
            status,
            error_rate: error_rate.map(|r| (r * 100.0).round() / 100.0),
            p95_latency_ms,
            requests_per_minute: requests_per_minute.map(|r| (r * 100.0).round() / 100.0),
            monitors: monitor_counts,
            recent_errors,
            definition,
        })
    }

    fn health_state(
        &self,
        error_rate: Option<f64>,
        p95_latency_ms: Option<f64>,
        monitors: &MonitorCounts,
    ) -> HealthState {
        let thresholds = &self.config.health;
        let rate = error_rate.unwrap_or(0.0);

        if rate >= thresholds.down_error_rate {
            return HealthState::Down;
        }
        let slow = p95_latency_ms
            .map(|p95| p95 >= thresholds.p95_latency_threshold.as_millis() as f64)
            .unwrap_or(false);
        if rate >= thresholds.degraded_error_rate || slow || monitors.alert > 0 {
            return HealthState::Degraded;
        }
        HealthState::Healthy
    }

    /// Aggregate the filter query and sum computed values across buckets.
    /// Percentiles take the worst bucket instead of the sum.
    async fn aggregate_totals(
        &self,
        filter_query: &str,
        range: TimeRange,
        computes: &[Compute],
    ) -> Result<BTreeMap<String, f64>> {
        let buckets = retry_with_config(self.retry(), || async {
            self.backend
                .aggregate_spans(filter_query, range, "resource_name", computes)
                .await
        })
        .await?;

        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for bucket in &buckets {
            for (key, value) in &bucket.computes {
                if key.starts_with('p') {
                    let entry = totals.entry(key.clone()).or_insert(0.0);
                    *entry = entry.max(*value);
                } else {
                    *totals.entry(key.clone()).or_insert(0.0) += value;
                }
            }
        }
        Ok(totals)
    }

    async fn fetch_monitors(&self, service: &ServiceName) -> Result<Vec<Monitor>> {
        let filter = MonitorFilter {
            service: Some(service.as_str().to_string()),
            ..MonitorFilter::default()
        };
        retry_with_config(self.retry(), || async {
            self.backend.list_monitors(&filter).await
        })
        .await
    }

    async fn recent_error_traces(
        &self,
        service: &ServiceName,
        environment: Option<&str>,
        range: TimeRange,
    ) -> Vec<SpanSummary> {
        let mut builder = SpanQueryBuilder::new(service.clone())
            .entry_spans_only()
            .status(SpanStatusFilter::Error);
        if let Some(env) = environment {
            builder = builder.environment(env);
        }
        let query = builder.build();
        let limit = self.config.health.recent_error_limit;

        match self
            .backend
            .list_spans(&query, range, TraceSortBy::Timestamp, limit)
            .await
        {
            Ok(spans) => spans,
            Err(e) => {
                tracing::warn!(
                    service = service.as_str(),
                    "recent error trace sample failed: {}",
                    e
                );
                Vec::new()
            },
        }
    }

    async fn definition_best_effort(&self, service: &ServiceName) -> Option<ServiceDefinition> {
        match self.backend.service_definition(service).await {
            Ok(definition) => definition,
            Err(e) => {
                tracing::warn!(
                    service = service.as_str(),
                    "service definition lookup failed: {}",
                    e
                );
                None
            },
        }
    }
}

fn discard_err<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("health query '{}' failed: {}", what, e);
            None
        },
    }
}
