//! Wire-level tests for the HTTP backend against a mock server.

use spanlens::backend::auth::StaticTokenProvider;
use spanlens::backend::http::HttpBackend;
use spanlens::backend::{Compute, MonitorFilter, MonitorStatus, TelemetryBackend};
use spanlens::core::config::BackendConfig;
use spanlens::core::{LensError, ServiceName, TimeRange, TraceSortBy};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    let config = BackendConfig {
        base_url: server.uri(),
        auth_service: "apm-backend".to_string(),
        request_timeout: Duration::from_secs(5),
    };
    HttpBackend::new(&config, Arc::new(StaticTokenProvider::new("tok-123"))).unwrap()
}

fn range() -> TimeRange {
    TimeRange::new(1_700_000_000_000, 1_700_003_600_000).unwrap()
}

#[tokio::test]
async fn test_query_metrics_parses_pointlist() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(bearer_token("tok-123"))
        // Epoch seconds, not milliseconds
        .and(query_param("from", "1700000000"))
        .and(query_param("to", "1700003600"))
        .and(query_param(
            "query",
            "avg:trace.http.request.duration{service:checkout}",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "series": [{
                "metric": "trace.http.request.duration",
                "scope": "service:checkout",
                "pointlist": [
                    [1700000000000.0, 42.5],
                    [1700000060000.0, null],
                    [1700000120000.0, 37.5]
                ]
            }]
        })))
        .mount(&server)
        .await;

    let response = backend(&server)
        .query_metrics("avg:trace.http.request.duration{service:checkout}", range())
        .await
        .unwrap();

    assert_eq!(response.series.len(), 1);
    let series = &response.series[0];
    assert_eq!(series.metric, "trace.http.request.duration");
    assert_eq!(series.scope, "service:checkout");
    // Null points are dropped, not zeroed
    assert_eq!(series.points.len(), 2);
    assert_eq!(series.points[0].value, 42.5);
    assert_eq!(series.points[0].timestamp_ms, 1_700_000_000_000);
    assert!(response.has_data());
}

#[tokio::test]
async fn test_rate_limit_maps_to_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .query_metrics("avg:m{service:s}", range())
        .await
        .unwrap_err();

    assert!(matches!(err, LensError::RateLimited(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_request_maps_to_permanent_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unparseable query"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .query_metrics("avg:m{service:s}", range())
        .await
        .unwrap_err();

    match &err {
        LensError::Permanent { status, message } => {
            assert_eq!(*status, 400);
            assert!(message.contains("unparseable query"));
        },
        other => panic!("expected Permanent, got {:?}", other),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_forbidden_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = backend(&server)
        .query_metrics("avg:m{service:s}", range())
        .await
        .unwrap_err();

    assert!(matches!(err, LensError::Auth(_)));
}

#[tokio::test]
async fn test_server_error_maps_to_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend(&server)
        .query_metrics("avg:m{service:s}", range())
        .await
        .unwrap_err();

    assert!(matches!(err, LensError::Transient(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_aggregate_spans_converts_percentiles_to_millis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/spans/analytics/aggregate"))
        .and(body_partial_json(serde_json::json!({
            "data": {
                "attributes": {
                    "filter": {"query": "service:checkout span.kind:entry"},
                    "group_by": [{"facet": "resource_name"}]
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "buckets": [{
                    "by": {"resource_name": "GET /cart"},
                    "computes": {
                        "count": 100.0,
                        "error_count": 5.0,
                        // Native nanoseconds
                        "p95": 250000000.0,
                        "p50": null
                    }
                }]
            }
        })))
        .mount(&server)
        .await;

    let buckets = backend(&server)
        .aggregate_spans(
            "service:checkout span.kind:entry",
            range(),
            "resource_name",
            &[Compute::Count, Compute::ErrorCount, Compute::Percentile(95)],
        )
        .await
        .unwrap();

    assert_eq!(buckets.len(), 1);
    let bucket = &buckets[0];
    assert_eq!(bucket.by.get("resource_name").map(String::as_str), Some("GET /cart"));
    assert_eq!(bucket.computes.get("count"), Some(&100.0));
    // ns -> ms
    assert_eq!(bucket.computes.get("p95"), Some(&250.0));
    // Null computes are dropped
    assert!(!bucket.computes.contains_key("p50"));
}

#[tokio::test]
async fn test_list_spans_converts_duration_and_sorts_by_duration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/spans/events/search"))
        .and(body_partial_json(serde_json::json!({
            "sort": "-duration",
            "page": {"limit": 25}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "attributes": {
                    "trace_id": "abc123",
                    "span_id": "def456",
                    "service": "checkout",
                    "operation_name": "express.request",
                    "resource_name": "GET /cart",
                    "start": 1700000000000i64,
                    "duration": 120000000.0,
                    "error": true,
                    "http_status_code": 500
                }
            }]
        })))
        .mount(&server)
        .await;

    let spans = backend(&server)
        .list_spans("service:checkout", range(), TraceSortBy::Duration, 25)
        .await
        .unwrap();

    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].trace_id, "abc123");
    assert_eq!(spans[0].duration_ms, 120.0);
    assert!(spans[0].is_error);
    assert_eq!(spans[0].http_status_code, Some(500));
}

#[tokio::test]
async fn test_search_logs_parses_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/logs/events/search"))
        .and(body_partial_json(serde_json::json!({
            "filter": {"query": "service:checkout payment"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "attributes": {
                    "timestamp": 1700000000000i64,
                    "status": "error",
                    "message": "payment gateway timeout",
                    "service": "checkout"
                }
            }]
        })))
        .mount(&server)
        .await;

    let entries = backend(&server)
        .search_logs("service:checkout payment", range(), 25)
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "payment gateway timeout");
    assert_eq!(entries[0].status.as_deref(), Some("error"));
}

#[tokio::test]
async fn test_list_monitors_parses_overall_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/monitor"))
        .and(query_param("monitor_tags", "service:checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 101,
                "name": "high error rate",
                "overall_state": "Alert",
                "type": "metric alert",
                "query": "avg(last_5m):errors > 10",
                "tags": ["service:checkout"]
            },
            {
                "id": 102,
                "name": "p95 latency",
                "overall_state": "OK",
                "query": "avg(last_5m):latency > 1000"
            }
        ])))
        .mount(&server)
        .await;

    let filter = MonitorFilter {
        service: Some("checkout".to_string()),
        ..MonitorFilter::default()
    };
    let monitors = backend(&server).list_monitors(&filter).await.unwrap();

    assert_eq!(monitors.len(), 2);
    assert_eq!(monitors[0].status, MonitorStatus::Alert);
    assert_eq!(monitors[0].monitor_type.as_deref(), Some("metric alert"));
    assert_eq!(monitors[1].status, MonitorStatus::Ok);
    assert!(monitors[1].message.is_none());
}

#[tokio::test]
async fn test_service_definition_found_and_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/services/definitions/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "attributes": {
                    "schema": {
                        "team": "payments",
                        "description": "checkout flow",
                        "links": [{"name": "runbook", "url": "https://wiki/checkout"}]
                    }
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/services/definitions/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = backend(&server);

    let definition = backend
        .service_definition(&ServiceName::new("checkout").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(definition.team.as_deref(), Some("payments"));
    assert_eq!(definition.links.len(), 1);

    // Missing definitions are a normal condition, not an error
    let missing = backend
        .service_definition(&ServiceName::new("ghost").unwrap())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_malformed_json_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .query_metrics("avg:m{service:s}", range())
        .await
        .unwrap_err();

    assert!(matches!(err, LensError::Parse { .. }));
    assert!(!err.is_transient());
}
