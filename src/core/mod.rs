//! Core domain models and foundations for spanlens.
//!
//! Holds the error taxonomy, configuration, validated identifier types
//! and the retry wrapper shared by every outbound backend call.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{LensError, Result};
pub use types::{
    ApmMetric, DataSource, MetricAggregation, OperationMetrics, ServiceName, SpanStatusFilter,
    TimeRange, ToolResult, TraceSortBy,
};
