//! Normalizes grouped span-aggregation buckets into per-operation records.

use crate::backend::AggregateBucket;
use crate::core::OperationMetrics;

/// Convert one aggregation bucket into an [`OperationMetrics`] record.
///
/// Tolerant of partially-populated computes: a missing value reads as 0.
/// The error rate is a percentage rounded to 2 decimals, computed only
/// when both error and total counts are present.
pub fn parse_bucket(bucket: &AggregateBucket, group_key: &str) -> OperationMetrics {
    let operation = bucket
        .by
        .get(group_key)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    let compute = |key: &str| bucket.computes.get(key).copied().unwrap_or(0.0);

    let request_count = compute("count").max(0.0) as u64;
    let error_count = compute("error_count").max(0.0) as u64;

    let error_rate = if request_count > 0 && bucket.computes.contains_key("error_count") {
        round2(100.0 * error_count as f64 / request_count as f64)
    } else {
        0.0
    };

    OperationMetrics {
        operation,
        request_count,
        error_count,
        p50_latency_ms: compute("p50").max(0.0),
        p95_latency_ms: compute("p95").max(0.0),
        p99_latency_ms: compute("p99").max(0.0),
        error_rate,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
