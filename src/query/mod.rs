//! Builder for backend span filter queries.
//!
//! Queries are rendered as `key:value` fragments joined by spaces with
//! implicit AND semantics. Fragment order is fixed, so equal filter sets
//! always produce byte-identical strings; downstream cache keys and test
//! assertions rely on that.

use crate::core::{ServiceName, SpanStatusFilter};
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters allowed in free-text tag values. Anything else is stripped
/// rather than escaped, so a hostile value cannot change query semantics.
static TOKEN_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-./:*]").expect("valid token regex"));

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Accumulates typed predicates and renders the backend filter query.
///
/// Service is mandatory; every other predicate is optional and
/// independently combinable.
#[derive(Debug, Clone)]
pub struct SpanQueryBuilder {
    service: ServiceName,
    environment: Option<String>,
    operation: Option<String>,
    entry_spans_only: bool,
    status: Option<SpanStatusFilter>,
    min_duration_ms: Option<u64>,
    max_duration_ms: Option<u64>,
    http_status_code: Option<u16>,
    http_method: Option<String>,
    error_type: Option<String>,
    span_type: Option<String>,
}

impl SpanQueryBuilder {
    /// Start a query for the given service
    pub fn new(service: ServiceName) -> Self {
        SpanQueryBuilder {
            service,
            environment: None,
            operation: None,
            entry_spans_only: false,
            status: None,
            min_duration_ms: None,
            max_duration_ms: None,
            http_status_code: None,
            http_method: None,
            error_type: None,
            span_type: None,
        }
    }

    /// Filter by deployment environment (rendered as the canonical `env:` tag)
    pub fn environment<S: Into<String>>(mut self, environment: S) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Filter by operation / resource name
    pub fn operation<S: Into<String>>(mut self, operation: S) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Restrict to entry spans so each logical request is counted once
    pub fn entry_spans_only(mut self) -> Self {
        self.entry_spans_only = true;
        self
    }

    /// Filter by span status
    pub fn status(mut self, status: SpanStatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    /// Minimum span duration in milliseconds (inclusive)
    pub fn min_duration_ms(mut self, ms: u64) -> Self {
        self.min_duration_ms = Some(ms);
        self
    }

    /// Maximum span duration in milliseconds (inclusive)
    pub fn max_duration_ms(mut self, ms: u64) -> Self {
        self.max_duration_ms = Some(ms);
        self
    }

    /// Filter by HTTP response status code
    pub fn http_status_code(mut self, code: u16) -> Self {
        self.http_status_code = Some(code);
        self
    }

    /// Filter by HTTP request method
    pub fn http_method<S: Into<String>>(mut self, method: S) -> Self {
        self.http_method = Some(method.into());
        self
    }

    /// Filter by error type / class
    pub fn error_type<S: Into<String>>(mut self, error_type: S) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Filter by span type (web, db, cache, ...)
    pub fn span_type<S: Into<String>>(mut self, span_type: S) -> Self {
        self.span_type = Some(span_type.into());
        self
    }

    /// Render the filter query.
    ///
    /// Idempotent and order-stable: fragments appear in a fixed declared
    /// sequence regardless of the order predicates were set in.
    pub fn build(&self) -> String {
        let mut fragments: Vec<String> = Vec::with_capacity(8);

        fragments.push(format!("service:{}", self.service.as_str()));

        if let Some(env) = &self.environment {
            fragments.push(format!("env:{}", sanitize_token(env)));
        }
        if let Some(operation) = &self.operation {
            fragments.push(format!("operation_name:{}", sanitize_token(operation)));
        }
        if self.entry_spans_only {
            fragments.push("span.kind:entry".to_string());
        }
        if let Some(status) = self.status {
            fragments.push(format!("status:{}", status.as_tag()));
        }

        // Durations are rendered in the backend's native nanoseconds.
        match (self.min_duration_ms, self.max_duration_ms) {
            (Some(min), Some(max)) => {
                fragments.push(format!(
                    "@duration:[{} TO {}]",
                    min * NANOS_PER_MILLI,
                    max * NANOS_PER_MILLI
                ));
            },
            (Some(min), None) => {
                fragments.push(format!("@duration:>={}", min * NANOS_PER_MILLI));
            },
            (None, Some(max)) => {
                fragments.push(format!("@duration:<={}", max * NANOS_PER_MILLI));
            },
            (None, None) => {},
        }

        if let Some(code) = self.http_status_code {
            fragments.push(format!("@http.status_code:{}", code));
        }
        if let Some(method) = &self.http_method {
            fragments.push(format!("@http.method:{}", sanitize_token(method).to_uppercase()));
        }
        if let Some(error_type) = &self.error_type {
            fragments.push(format!("@error.type:{}", sanitize_token(error_type)));
        }
        if let Some(span_type) = &self.span_type {
            fragments.push(format!("type:{}", sanitize_token(span_type)));
        }

        fragments.join(" ")
    }
}

/// Strip characters outside the tag value grammar from a free-text value
pub fn sanitize_token(raw: &str) -> String {
    TOKEN_STRIP_RE.replace_all(raw.trim(), "").into_owned()
}
