//! Shared vocabulary: ids, sizes, errors, configuration and thread affinity.

/// Configuration loaded once per engine instance.
pub mod config;
/// Plain value types shared by every module.
pub mod core;
/// Error type and result alias.
pub mod error;
pub(crate) mod math;
/// Process-wide resource locations.
pub mod paths;
/// Owner-thread affinity checks.
pub mod thread;
