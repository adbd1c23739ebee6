//! Spanlens - resilient APM telemetry query toolkit.
//!
//! Spanlens answers natural-language tool calls (service health, log
//! search, trace listing, monitor state, per-operation metrics) by
//! querying a remote APM backend and normalizing its heterogeneous
//! response shapes into stable result contracts.
//!
//! # Architecture
//!
//! - `core`: error taxonomy, configuration, validated identifiers, retry
//! - `cache`: TTL-aware result cache keyed by request fingerprints
//! - `query`: span filter query builder
//! - `backend`: telemetry backend trait, wire types and HTTP transport
//! - `resolve`: metric discovery probe and the hybrid fast/fallback resolver
//! - `tools`: the tool surface returning `ToolResult` envelopes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use spanlens::backend::auth::StaticTokenProvider;
//! use spanlens::backend::http::HttpBackend;
//! use spanlens::core::Config;
//! use spanlens::tools::{ServiceHealthInput, Toolkit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let tokens = Arc::new(StaticTokenProvider::new("token"));
//!     let backend = Arc::new(HttpBackend::new(&config.backend, tokens)?);
//!     let toolkit = Toolkit::new(config, backend)?;
//!
//!     let health = toolkit
//!         .get_service_health(ServiceHealthInput {
//!             service: "checkout".to_string(),
//!             environment: None,
//!         })
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&health)?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod cache;
pub mod core;
pub mod query;
pub mod resolve;
pub mod tools;

// Re-export core types for convenience
pub use crate::core::{Config, LensError, Result, ToolResult};
pub use crate::tools::Toolkit;
