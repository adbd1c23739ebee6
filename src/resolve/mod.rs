//! Telemetry query resolution engine.
//!
//! - `discovery`: which metric names actually hold data for a service
//! - `aggregation`: normalize grouped span buckets into operation records
//! - `hybrid`: fast-path / fallback orchestration over both strategies

pub mod aggregation;
pub mod discovery;
pub mod hybrid;

pub use aggregation::parse_bucket;
pub use discovery::{DiscoveredMetrics, MetricProbe};
pub use hybrid::HybridOperationsResolver;
