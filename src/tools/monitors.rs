//! `get_monitors`: monitor listing grouped and sorted by alerting state.

use super::Toolkit;
use crate::backend::{Monitor, MonitorFilter, MonitorStatus};
use crate::core::retry::retry_with_config;
use crate::core::{Result, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input record for `get_monitors`; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMonitorsInput {
    #[serde(default)]
    pub service: Option<String>,
    /// Alerting state filter: `alert`, `warn`, `no_data` or `ok`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub monitor_type: Option<String>,
}

/// Result payload for `get_monitors`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorsData {
    pub total_monitors: usize,
    /// Monitor counts per alerting state
    pub by_status: BTreeMap<String, usize>,
    /// Monitors sorted most severe first
    pub monitors: Vec<Monitor>,
}

impl Toolkit {
    /// List monitors, optionally filtered by service, status, tags or type
    pub async fn get_monitors(&self, input: GetMonitorsInput) -> ToolResult<MonitorsData> {
        let key = match self.fingerprint("get_monitors", &input) {
            Ok(key) => key,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if let Some(data) = self.cache_lookup::<MonitorsData>(&key) {
            return ToolResult::ok_cached(data);
        }

        match self.get_monitors_inner(&input).await {
            Ok(data) => {
                self.cache_store(&key, &data, self.config.cache.status_ttl);
                ToolResult::ok(data)
            },
            Err(e) => {
                tracing::warn!(category = e.category(), "get_monitors failed: {}", e);
                ToolResult::failure(e.to_string())
            },
        }
    }

    async fn get_monitors_inner(&self, input: &GetMonitorsInput) -> Result<MonitorsData> {
        // Validate the service tag without requiring it.
        let service = match &input.service {
            Some(raw) => Some(self.service(raw)?.into_inner()),
            None => None,
        };
        let status_filter: Option<MonitorStatus> = match &input.status {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };

        let filter = MonitorFilter {
            service,
            tags: input.tags.clone().unwrap_or_default(),
            monitor_type: input.monitor_type.clone(),
        };

        let mut monitors: Vec<Monitor> = retry_with_config(self.retry(), || async {
            self.backend.list_monitors(&filter).await
        })
        .await?;

        // The status filter is applied here as well, so backends that
        // ignore it still produce a correct listing.
        if let Some(status) = status_filter {
            monitors.retain(|monitor| monitor.status == status);
        }

        monitors.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for monitor in &monitors {
            *by_status.entry(monitor.status.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(MonitorsData {
            total_monitors: monitors.len(),
            by_status,
            monitors,
        })
    }
}
