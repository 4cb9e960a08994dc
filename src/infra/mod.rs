//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod origin;
pub mod tasks;
pub mod telemetry;
