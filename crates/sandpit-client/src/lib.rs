//! HTTP client for the sandpit sandbox API.
//!
//! Every call goes through one request pipeline: cache lookup (reads only),
//! token-bucket rate limiting keyed by operation class, the transport call
//! wrapped in a retry policy that honors server `Retry-After` hints, error
//! classification, and a cache store on success. See [`SandpitClient`].

#![doc(html_root_url = "https://docs.rs/sandpit-client/0.3.0")]

pub mod api;
pub mod cache;
mod client;
pub mod limit;
mod retry;
mod stream;

pub use client::{SandpitClient, SandpitClientBuilder};
pub use retry::RetryPolicy;
pub use sandpit_core::{Result, SandpitError};
pub use stream::SseStream;
