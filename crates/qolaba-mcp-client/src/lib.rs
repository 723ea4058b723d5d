//! Resilient HTTP client for the Qolaba API.
//!
//! This crate owns the hard parts of talking to the remote API:
//! - two mutually exclusive authentication modes (static API key, OAuth2
//!   client credentials with proactive token refresh),
//! - bounded exponential-backoff retry across distinguishable failure
//!   classes (network errors, 5xx, 429 with `Retry-After`, one-shot 401
//!   refresh),
//! - classification of every outcome into a typed result or a typed error.
//!
//! The pieces are deliberately separable: [`backoff::BackoffPolicy`] and
//! [`classify`] are pure, [`auth`] holds the credential state, and
//! [`ApiClient`] is the state machine that strings them together.

pub mod auth;
pub mod backoff;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod response;
pub mod telemetry;

pub use auth::{Credential, OAuthToken};
pub use backoff::BackoffPolicy;
pub use classify::{Action, RetryClass};
pub use client::{ApiClient, CallOptions, Method, RequestBody};
pub use config::{AuthMode, ClientConfig};
pub use error::{ApiClientError, ClientResult};
pub use response::{ApiResponse, ParsedBody};
pub use telemetry::{AttemptRecord, NoopSink, SharedSink, TelemetrySink};
