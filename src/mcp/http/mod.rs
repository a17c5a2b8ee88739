//! HTTP client and API communication layer for OHIP.
//!
//! This module handles all HTTP communication with the identity endpoint and
//! the OHIP REST API, including token caching, request construction, and
//! response handling.

pub(crate) mod client;
mod token;

// Re-export the client's public API
pub use client::{ApiRequest, OhipClient};
