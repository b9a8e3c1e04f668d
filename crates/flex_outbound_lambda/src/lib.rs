//! Lambda handlers and platform adapters for Flex outbound messaging.
//!
//! This crate owns runtime integration details (Lambda handlers, the
//! communications platform REST adapter, API Gateway response plumbing and
//! environment configuration). Domain contracts come from
//! `flex_outbound_core`, re-exported here as `runtime`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod response;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use flex_outbound_core as runtime;
