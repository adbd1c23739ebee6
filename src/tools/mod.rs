//! Tool surface exposed to the chat orchestration layer.
//!
//! Each tool takes a closed, named input record, validates it at the
//! boundary, and returns a `ToolResult` envelope. Failures are always
//! converted into `success: false` results; nothing here panics or
//! propagates a raw error to the caller.

use crate::backend::TelemetryBackend;
use crate::cache::{self, CacheStore};
use crate::core::retry::RetryConfig;
use crate::core::{Config, Result, ServiceName, TimeRange};
use crate::resolve::{HybridOperationsResolver, MetricProbe};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

mod health;
mod logs;
mod metrics;
mod monitors;
mod operations;
mod traces;

pub use health::{HealthData, HealthState, MonitorCounts, ServiceHealthInput};
pub use logs::{LogSearchData, SearchLogsInput};
pub use metrics::{ApmMetricsData, ApmMetricsInput, MetricSummary};
pub use monitors::{GetMonitorsInput, MonitorsData};
pub use operations::{OperationsData, ServiceOperationsInput};
pub use traces::{QueryTracesInput, TraceListData};

/// Default relative window applied when a tool call omits `time_range`
pub const DEFAULT_TIME_RANGE: &str = "1h";

const DEFAULT_LIMIT: usize = 25;
const MAX_LIMIT: usize = 100;

/// Composition root: owns the backend handle, the result cache and the
/// resolvers, and exposes the tool functions.
///
/// Explicitly constructed and dependency-injected; there are no hidden
/// module-level singletons.
pub struct Toolkit {
    pub(crate) backend: Arc<dyn TelemetryBackend>,
    pub(crate) cache: CacheStore,
    pub(crate) resolver: HybridOperationsResolver,
    pub(crate) probe: MetricProbe,
    pub(crate) config: Config,
}

impl Toolkit {
    /// Build a toolkit from validated configuration and an injected backend
    pub fn new(config: Config, backend: Arc<dyn TelemetryBackend>) -> Result<Self> {
        config.validate()?;
        let cache = CacheStore::new(&config.cache);
        let resolver = HybridOperationsResolver::new(backend.clone(), config.retry.clone());
        let probe = MetricProbe::new(backend.clone(), config.retry.clone());
        Ok(Toolkit {
            backend,
            cache,
            resolver,
            probe,
            config,
        })
    }

    pub(crate) fn retry(&self) -> &RetryConfig {
        &self.config.retry
    }

    /// Compute the fingerprint for a tool invocation
    pub(crate) fn fingerprint<T: Serialize>(&self, operation: &str, input: &T) -> Result<String> {
        let params = serde_json::to_value(input)?;
        Ok(cache::fingerprint(operation, &params))
    }

    /// Typed cache lookup; decode failures read as misses
    pub(crate) fn cache_lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key, "discarding undecodable cache entry: {}", e);
                None
            },
        }
    }

    /// Store a tool result; serialization failures are logged, not fatal
    pub(crate) fn cache_store<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        match serde_json::to_value(data) {
            Ok(value) => self.cache.set(key, value, ttl),
            Err(e) => tracing::warn!(key, "failed to serialize result for cache: {}", e),
        }
    }

    /// Resolve an optional relative range expression against the wall clock
    pub(crate) fn resolve_range(&self, expr: Option<&str>) -> Result<TimeRange> {
        let expr = expr.unwrap_or(DEFAULT_TIME_RANGE);
        TimeRange::parse_relative(expr, chrono::Utc::now().timestamp_millis())
    }

    /// Validate a raw service name at the tool boundary
    pub(crate) fn service(&self, raw: &str) -> Result<ServiceName> {
        ServiceName::new(raw)
    }
}

/// Clamp a caller-supplied listing limit into the accepted window
pub(crate) fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 25);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(50)), 50);
        assert_eq!(clamp_limit(Some(10_000)), 100);
    }
}
