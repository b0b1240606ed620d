//! Integration tests entry point
//!
//! This file serves as the entry point for all integration tests.
//! It includes the integration_tests module which contains:
//! - Monitoring cycle tests
//! - Notification routing and delivery tests

mod common;
mod integration_tests;
