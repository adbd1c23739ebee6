//! `get_service_operations`: per-operation metrics via the hybrid resolver.

use super::{Toolkit, DEFAULT_TIME_RANGE};
use crate::core::{DataSource, OperationMetrics, Result, ToolResult};
use serde::{Deserialize, Serialize};

/// Input record for `get_service_operations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOperationsInput {
    pub service: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
}

/// Result payload for `get_service_operations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationsData {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub time_range: String,
    /// Which strategy produced the records; trace-metrics results carry
    /// latency only
    pub data_source: DataSource,
    pub operations: Vec<OperationMetrics>,
}

impl Toolkit {
    /// List operations of a service with their request/error/latency stats
    pub async fn get_service_operations(
        &self,
        input: ServiceOperationsInput,
    ) -> ToolResult<OperationsData> {
        let key = match self.fingerprint("get_service_operations", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<OperationsData>(&key) {
            return ToolResult::ok_cached(data);
        }

        match self.get_service_operations_inner(&input).await {
            Ok(data) => {
                let ttl = match self.resolve_range(input.time_range.as_deref()) {
                    Ok(range) => self.config.cache.ttl_for_window(range.duration_ms()),
                    Err(_) => self.config.cache.short_ttl,
                };
                self.cache_store(&key, &data, ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(
                    service = input.service,
                    category = e.category(),
                    "get_service_operations failed: {}",
                    e
                );
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn get_service_operations_inner(
        &self,
        input: &ServiceOperationsInput,
    ) -> Result<OperationsData> {
        let service = self.service(&input.service)?;
        let range = self.resolve_range(input.time_range.as_deref())?;

        let (operations, data_source) = self
            .resolver
            .resolve(&service, input.environment.as_deref(), range)
            .await?;

        Ok(OperationsData {
            service: service.into_inner(),
            environment: input.environment.clone(),
            time_range: input
                .time_range
                .clone()
                .unwrap_or_else(|| DEFAULT_TIME_RANGE.to_string()),
            data_source,
            operations,
        })
    }
}
