//! hapsync Data Plane provider
//!
//! Speaks the HAProxy Data Plane API (v2 and v3) for the hapsync core:
//! ordered rule collections under a backend or frontend, and the
//! configuration transactions that group writes.

pub mod client;
pub mod config;
pub mod payload;

pub use client::DataPlaneClient;
pub use config::DataPlaneConfig;
