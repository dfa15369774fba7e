//! Typed async Rust client for malware-sandbox dynamic analysis services.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sandpit::{AnalysisRequest, SandpitClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> sandpit::Result<()> {
//!     let client = SandpitClient::new("your-api-key")?;
//!
//!     // Detonate a sample
//!     let task = client.analysis().submit_file("dropper.exe", bytes).await?;
//!     println!("submitted: {}", task.task_id);
//!
//!     // Wait for the verdict
//!     let analysis = client
//!         .analysis()
//!         .wait_for_completion(&task.task_id, Duration::from_secs(5))
//!         .await?;
//!     println!("verdict: {:?}", analysis.verdict);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS
//! - `redis-cache` - Share the response cache across processes via Redis

#![doc(html_root_url = "https://docs.rs/sandpit/0.3.0")]

// Re-export core types
pub use sandpit_core::*;

// Re-export client
pub use sandpit_client::{SandpitClient, SandpitClientBuilder, SseStream};

// Re-export runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
