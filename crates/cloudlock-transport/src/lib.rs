//! HTTP transport to the vendor cloud API.
//!
//! The transport is deliberately thin: one attempt per call, a fixed
//! timeout, and body-level vendor-error detection. Retry and backoff are
//! caller concerns (the session manager and each device controller carry
//! their own policy), and the transport never logs - only the caller
//! knows the right verbosity for a failure.

mod client;

pub use client::{CloudClient, CloudConfig};
pub use reqwest::Method;
