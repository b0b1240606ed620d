//! Integration tests module
//!
//! End-to-end monitoring cycles against wiremock pages and the in-memory
//! store:
//! - First sight, idempotence and change detection
//! - Failure threshold alerts and recovery
//! - Cancellation between sources
//! - Routing, digests and delivery fallback
//! - On-demand health checks

pub mod cycle_test;
pub mod delivery_test;
pub mod health_test;
