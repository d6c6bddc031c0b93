//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod fetch;
pub mod provisioner;
pub mod telemetry;
