//! Shared Flex outbound messaging domain primitives.
//!
//! This crate owns the platform resource shapes, request/response contracts
//! and the pure decisions the handlers make (validation, flow selection,
//! session-to-channel mapping). It intentionally excludes HTTP and Lambda
//! runtime concerns; those live in `flex_outbound_lambda`.

pub mod attributes;
pub mod contract;
pub mod identifiers;
pub mod resources;
pub mod routing;
