//! `search_logs`: log event search scoped to one service.

use super::{clamp_limit, Toolkit};
use crate::backend::LogEntry;
use crate::core::retry::retry_with_config;
use crate::core::{Result, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input record for `search_logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogsInput {
    pub service: String,
    /// Free-text log search expression, passed through to the backend
    pub query: String,
    pub time_range: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Result payload for `search_logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSearchData {
    pub service: String,
    /// The full query sent to the backend
    pub query: String,
    pub total: usize,
    /// Entry counts per log level
    pub level_counts: BTreeMap<String, usize>,
    pub entries: Vec<LogEntry>,
}

impl Toolkit {
    /// Search logs for a service
    pub async fn search_logs(&self, input: SearchLogsInput) -> ToolResult<LogSearchData> {
        let key = match self.fingerprint("search_logs", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<LogSearchData>(&key) {
            return ToolResult::ok_cached(data);
        }

        match self.search_logs_inner(&input).await {
            Ok(data) => {
                self.cache_store(&key, &data, self.config.cache.listing_ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(
                    service = input.service,
                    category = e.category(),
                    "search_logs failed: {}",
                    e
                );
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn search_logs_inner(&self, input: &SearchLogsInput) -> Result<LogSearchData> {
        let service = self.service(&input.service)?;
        let range = self.resolve_range(Some(&input.time_range))?;
        let limit = clamp_limit(input.limit);

        let user_query = input.query.trim();
        let query = if user_query.is_empty() {
            format!("service:{}", service.as_str())
        } else {
            format!("service:{} {}", service.as_str(), user_query)
        };

        let entries = retry_with_config(self.retry(), || async {
            self.backend.search_logs(&query, range, limit).await
        })
        .await?;

        let mut level_counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &entries {
            let level = entry.status.as_deref().unwrap_or("unknown").to_lowercase();
            *level_counts.entry(level).or_insert(0) += 1;
        }

        Ok(LogSearchData {
            service: service.into_inner(),
            query,
            total: entries.len(),
            level_counts,
            entries,
        })
    }
}
