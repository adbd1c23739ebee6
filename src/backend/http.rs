//! HTTP implementation of [`TelemetryBackend`] over reqwest.
//!
//! Speaks a Datadog-style REST surface: v1 timeseries queries and
//! monitors, v2 span/log event search and aggregation. HTTP status codes
//! are mapped onto the crate error taxonomy so the retry wrapper can
//! classify responses; the transport itself never retries.

use super::auth::TokenProvider;
use super::{
    AggregateBucket, Compute, LogEntry, MetricPoint, MetricResponse, MetricSeries, Monitor,
    MonitorFilter, MonitorStatus, ServiceDefinition, ServiceLink, SpanSummary, TelemetryBackend,
};
use crate::core::config::BackendConfig;
use crate::core::{LensError, Result, ServiceName, TimeRange, TraceSortBy};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Telemetry backend speaking Datadog-flavored HTTP endpoints
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    auth_service: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpBackend {
    /// Build a backend client from configuration and a token provider
    pub fn new(config: &BackendConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(HttpBackend {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_service: config.auth_service.clone(),
            tokens,
        })
    }

    async fn bearer(&self) -> Result<String> {
        match self.tokens.access_token(&self.auth_service).await? {
            Some(token) => Ok(token),
            None => Err(LensError::auth(format!(
                "no access token available for '{}'",
                self.auth_service
            ))),
        }
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        self.decode(response).await
    }

    /// Map HTTP status onto the error taxonomy, then decode the JSON body
    async fn decode(&self, response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                LensError::parse(format!("backend returned malformed JSON: {}", e))
            });
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate(&body, 200))
        };

        Err(match code {
            429 => LensError::RateLimited(detail),
            401 | 403 => LensError::auth(detail),
            400..=499 => LensError::permanent(code, detail),
            _ => LensError::transient(detail),
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| LensError::parse(format!("unexpected {} response shape: {}", what, e)))
}

const NANOS_PER_MILLI: f64 = 1e6;

#[derive(Deserialize)]
struct TimeseriesPayload {
    #[serde(default)]
    series: Vec<TimeseriesSeries>,
}

#[derive(Deserialize)]
struct TimeseriesSeries {
    metric: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    pointlist: Vec<Vec<Option<f64>>>,
}

#[derive(Deserialize)]
struct AggregatePayload {
    data: AggregateData,
}

#[derive(Deserialize)]
struct AggregateData {
    #[serde(default)]
    buckets: Vec<AggregateBucketPayload>,
}

#[derive(Deserialize)]
struct AggregateBucketPayload {
    #[serde(default)]
    by: BTreeMap<String, String>,
    #[serde(default)]
    computes: BTreeMap<String, Option<f64>>,
}

#[derive(Deserialize)]
struct EventsPayload<T> {
    #[serde(default = "Vec::new")]
    data: Vec<EventEnvelope<T>>,
}

#[derive(Deserialize)]
struct EventEnvelope<T> {
    attributes: T,
}

#[derive(Deserialize)]
struct LogEventAttributes {
    timestamp: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    attributes: serde_json::Value,
}

#[derive(Deserialize)]
struct SpanEventAttributes {
    trace_id: String,
    span_id: String,
    service: String,
    operation_name: String,
    #[serde(default)]
    resource_name: Option<String>,
    start: i64,
    /// Native nanoseconds
    duration: f64,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    http_status_code: Option<u16>,
}

#[derive(Deserialize)]
struct MonitorPayload {
    id: i64,
    name: String,
    overall_state: MonitorStatus,
    #[serde(rename = "type", default)]
    monitor_type: Option<String>,
    #[serde(default)]
    query: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct DefinitionPayload {
    data: DefinitionData,
}

#[derive(Deserialize)]
struct DefinitionData {
    attributes: DefinitionAttributes,
}

#[derive(Deserialize)]
struct DefinitionAttributes {
    schema: DefinitionSchema,
}

#[derive(Deserialize)]
struct DefinitionSchema {
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    links: Vec<ServiceLink>,
}

fn compute_body(computes: &[Compute]) -> Vec<serde_json::Value> {
    computes
        .iter()
        .map(|compute| match compute {
            Compute::Count => json!({"aggregation": "count"}),
            Compute::ErrorCount => json!({"aggregation": "error_count"}),
            Compute::Percentile(p) => {
                json!({"aggregation": "pct", "percentile": p, "metric": "@duration"})
            },
        })
        .collect()
}

#[async_trait]
impl TelemetryBackend for HttpBackend {
    async fn query_metrics(&self, query: &str, range: TimeRange) -> Result<MetricResponse> {
        // v1 timeseries query takes epoch seconds.
        let params: Vec<(&str, String)> = vec![
            ("from", (range.from_ms / 1000).to_string()),
            ("to", (range.to_ms / 1000).to_string()),
            ("query", query.to_string()),
        ];
        let value = self.get_json("/api/v1/query", &params).await?;
        let payload: TimeseriesPayload = parse_payload(value, "metric query")?;

        let series = payload
            .series
            .into_iter()
            .map(|s| MetricSeries {
                metric: s.metric,
                scope: s.scope.unwrap_or_default(),
                points: s
                    .pointlist
                    .into_iter()
                    .filter_map(|point| match point.as_slice() {
                        [Some(ts), Some(value)] => Some(MetricPoint {
                            timestamp_ms: *ts as i64,
                            value: *value,
                        }),
                        _ => None,
                    })
                    .collect(),
            })
            .collect();

        Ok(MetricResponse { series })
    }

    async fn aggregate_spans(
        &self,
        filter_query: &str,
        range: TimeRange,
        group_by: &str,
        computes: &[Compute],
    ) -> Result<Vec<AggregateBucket>> {
        let body = json!({
            "data": {
                "type": "aggregate_request",
                "attributes": {
                    "filter": {
                        "query": filter_query,
                        "from": range.from_ms,
                        "to": range.to_ms,
                    },
                    "compute": compute_body(computes),
                    "group_by": [{"facet": group_by}],
                }
            }
        });
        let value = self.post_json("/api/v2/spans/analytics/aggregate", &body).await?;
        let payload: AggregatePayload = parse_payload(value, "span aggregation")?;

        let buckets = payload
            .data
            .buckets
            .into_iter()
            .map(|bucket| AggregateBucket {
                by: bucket.by,
                computes: bucket
                    .computes
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key, v)))
                    // Percentile computes come back in native nanoseconds.
                    .map(|(key, v)| {
                        if key.starts_with('p') && key[1..].chars().all(|c| c.is_ascii_digit()) {
                            (key, v / NANOS_PER_MILLI)
                        } else {
                            (key, v)
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(buckets)
    }

    async fn search_logs(
        &self,
        query: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        let body = json!({
            "filter": {
                "query": query,
                "from": range.from_ms,
                "to": range.to_ms,
            },
            "page": {"limit": limit},
            "sort": "-timestamp",
        });
        let value = self.post_json("/api/v2/logs/events/search", &body).await?;
        let payload: EventsPayload<LogEventAttributes> = parse_payload(value, "log search")?;

        Ok(payload
            .data
            .into_iter()
            .map(|event| LogEntry {
                timestamp_ms: event.attributes.timestamp,
                status: event.attributes.status,
                message: event.attributes.message,
                service: event.attributes.service,
                attributes: event.attributes.attributes,
            })
            .collect())
    }

    async fn list_spans(
        &self,
        query: &str,
        range: TimeRange,
        sort: TraceSortBy,
        limit: usize,
    ) -> Result<Vec<SpanSummary>> {
        let sort_field = match sort {
            TraceSortBy::Duration => "-duration",
            TraceSortBy::Timestamp => "-timestamp",
        };
        let body = json!({
            "filter": {
                "query": query,
                "from": range.from_ms,
                "to": range.to_ms,
            },
            "page": {"limit": limit},
            "sort": sort_field,
        });
        let value = self.post_json("/api/v2/spans/events/search", &body).await?;
        let payload: EventsPayload<SpanEventAttributes> = parse_payload(value, "span search")?;

        Ok(payload
            .data
            .into_iter()
            .map(|event| SpanSummary {
                trace_id: event.attributes.trace_id,
                span_id: event.attributes.span_id,
                service: event.attributes.service,
                operation: event.attributes.operation_name,
                resource: event.attributes.resource_name,
                start_ms: event.attributes.start,
                duration_ms: event.attributes.duration / NANOS_PER_MILLI,
                is_error: event.attributes.error,
                http_status_code: event.attributes.http_status_code,
            })
            .collect())
    }

    async fn list_monitors(&self, filter: &MonitorFilter) -> Result<Vec<Monitor>> {
        let mut tags: Vec<String> = Vec::new();
        if let Some(service) = &filter.service {
            tags.push(format!("service:{}", service));
        }
        tags.extend(filter.tags.iter().cloned());

        let mut params: Vec<(&str, String)> = Vec::new();
        if !tags.is_empty() {
            params.push(("monitor_tags", tags.join(",")));
        }
        if let Some(monitor_type) = &filter.monitor_type {
            params.push(("type", monitor_type.clone()));
        }

        let value = self.get_json("/api/v1/monitor", &params).await?;
        let payload: Vec<MonitorPayload> = parse_payload(value, "monitor list")?;

        Ok(payload
            .into_iter()
            .map(|m| Monitor {
                id: m.id,
                name: m.name,
                status: m.overall_state,
                monitor_type: m.monitor_type,
                query: m.query,
                message: m.message,
                tags: m.tags,
            })
            .collect())
    }

    async fn service_definition(&self, service: &ServiceName) -> Result<Option<ServiceDefinition>> {
        let path = format!("/api/v2/services/definitions/{}", service.as_str());
        let value = match self.get_json(&path, &[]).await {
            Ok(value) => value,
            // A service without a definition is a normal condition.
            Err(LensError::Permanent { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let payload: DefinitionPayload = parse_payload(value, "service definition")?;

        Ok(Some(ServiceDefinition {
            service: service.as_str().to_string(),
            team: payload.data.attributes.schema.team,
            description: payload.data.attributes.schema.description,
            links: payload.data.attributes.schema.links,
        }))
    }
}
