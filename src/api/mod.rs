//! Scheduling backend access.

pub mod client;
pub mod envelope;

pub use client::{BackendClient, ProgramId};
pub use envelope::{ApiEnvelope, ApiError};
