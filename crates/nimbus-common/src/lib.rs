//! Common types for nimbus: CRDs, errors, and logging

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod telemetry;

pub use error::{Error, ProviderError, ProviderErrorKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the nimbus CRDs
pub const API_GROUP: &str = "nimbus.dev";

/// Finalizer that keeps a tenant object alive until its infrastructure is
/// gone. The invoking scheduler sets it and drops it only when a deletion
/// pass reports the stack absent.
pub const INFRASTRUCTURE_FINALIZER: &str = "nimbus.dev/infrastructure";
