//! `query_apm_traces`: span listing with combinable filters.

use super::{clamp_limit, Toolkit};
use crate::backend::SpanSummary;
use crate::core::retry::retry_with_config;
use crate::core::{Result, SpanStatusFilter, ToolResult, TraceSortBy};
use crate::query::SpanQueryBuilder;
use serde::{Deserialize, Serialize};

/// Input record for `query_apm_traces`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTracesInput {
    pub service: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub status: Option<SpanStatusFilter>,
    #[serde(default)]
    pub min_duration_ms: Option<u64>,
    #[serde(default)]
    pub max_duration_ms: Option<u64>,
    #[serde(default)]
    pub http_status_code: Option<u16>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub span_type: Option<String>,
    #[serde(default)]
    pub sort_by: Option<TraceSortBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Result payload for `query_apm_traces`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceListData {
    pub service: String,
    /// The filter query sent to the backend
    pub query: String,
    pub total: usize,
    pub spans: Vec<SpanSummary>,
}

impl Toolkit {
    /// List spans matching the given filters
    pub async fn query_apm_traces(&self, input: QueryTracesInput) -> ToolResult<TraceListData> {
        let key = match self.fingerprint("query_apm_traces", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<TraceListData>(&key) {
            return ToolResult::ok_cached(data);
        }

        match self.query_apm_traces_inner(&input).await {
            Ok(data) => {
                self.cache_store(&key, &data, self.config.cache.listing_ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(
                    service = input.service,
                    category = e.category(),
                    "query_apm_traces failed: {}",
                    e
                );
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn query_apm_traces_inner(&self, input: &QueryTracesInput) -> Result<TraceListData> {
        let service = self.service(&input.service)?;
        let range = self.resolve_range(input.time_range.as_deref())?;
        let limit = clamp_limit(input.limit);
        let sort = input.sort_by.unwrap_or(TraceSortBy::Duration);

        let mut builder = SpanQueryBuilder::new(service.clone());
        if let Some(env) = &input.environment {
            builder = builder.environment(env);
        }
        if let Some(operation) = &input.operation {
            builder = builder.operation(operation);
        }
        // Entry spans only, unless the caller asked for a specific span
        // type (db, cache, ...) which lives below the entry point.
        if input.span_type.is_none() {
            builder = builder.entry_spans_only();
        } else if let Some(span_type) = &input.span_type {
            builder = builder.span_type(span_type);
        }
        if let Some(status) = input.status {
            builder = builder.status(status);
        }
        if let Some(min) = input.min_duration_ms {
            builder = builder.min_duration_ms(min);
        }
        if let Some(max) = input.max_duration_ms {
            builder = builder.max_duration_ms(max);
        }
        if let Some(code) = input.http_status_code {
            builder = builder.http_status_code(code);
        }
        if let Some(method) = &input.http_method {
            builder = builder.http_method(method);
        }
        if let Some(error_type) = &input.error_type {
            builder = builder.error_type(error_type);
        }
        let query = builder.build();

        let spans = retry_with_config(self.retry(), || async {
            self.backend.list_spans(&query, range, sort, limit).await
        })
        .await?;

        Ok(TraceListData {
            service: service.into_inner(),
            query,
            total: spans.len(),
            spans,
        })
    }
}
