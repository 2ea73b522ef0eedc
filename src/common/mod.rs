//! Shared infrastructure: the service-level error type.

pub mod error;

pub use error::{Result, ServiceError};
