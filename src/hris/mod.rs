//! Client for the upstream HRIS, the system of record for employees and org structure.

pub mod client;
pub mod types;

pub use client::HrisClient;
pub use types::HrisError;
