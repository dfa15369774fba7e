//! Core types and errors for the sandpit sandbox API client.
//!
//! This crate provides the foundational pieces used across the sandpit library:
//!
//! - **Types**: Strongly-typed analysis, environment and account models
//! - **Errors**: The [`SandpitError`] taxonomy that drives retry decisions
//! - **Config**: [`ClientConfig`] and its cache/rate-limit/retry sections
//!
//! # Example
//!
//! ```rust,ignore
//! use sandpit_core::{Analysis, Result, SandpitError};
//!
//! fn report(analysis: Analysis) -> Result<()> {
//!     println!("task: {}", analysis.task_id);
//!     println!("status: {}", analysis.status);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sandpit-core/0.3.0")]

pub mod config;
mod error;
pub mod types;

pub use config::{
    CacheBackendKind, CacheConfig, ClientConfig, RateLimitConfig, RetryConfig, RetryStrategy,
};
pub use error::{Result, SandpitError, DEFAULT_RETRY_AFTER_SECS};
pub use types::*;
