//! evotrace-sdk: the public facade over evotrace's trace store, span
//! tracker, and learning engine.
//!
//! # Overview
//!
//! `evotrace-sdk` wires the process-global tracker, the store, and the
//! learning/evolution components into one ergonomic async API, so a host
//! process doesn't need to reach into `evotrace-engine` or
//! `evotrace-learning` directly.
//!
//! # Quickstart
//!
//! ```no_run
//! use evotrace_sdk::Client;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect_default().await?;
//!
//! client.tracking().start_task(json!({"prompt": "summarize this doc"}), None).await?;
//! client.tracking().start_execution(None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! This SDK is a facade over:
//! - `evotrace-types`: the shared data model.
//! - `evotrace-store`: durable persistence.
//! - `evotrace-engine`: `SpanTracker` and `Instrumentation`.
//! - `evotrace-learning`: `LearningEngine`, `Optimizer`, `AbEngine`,
//!   `BootstrapLoader`, `LinkManager`, `FeedbackCollector`.
//! - `evotrace-runtime`: process-global tracker lifecycle and configuration.
//!
//! # Usage patterns
//!
//! ## Pattern mining
//!
//! ```no_run
//! use evotrace_sdk::Client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect_default().await?;
//! let patterns = client.learning().extract_and_store("agent-1".to_string(), "Worker".to_string()).await?;
//! println!("mined {} patterns", patterns.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## A/B experiments
//!
//! ```no_run
//! use evotrace_sdk::Client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect_default().await?;
//! let experiments = client.experiments();
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod experiments;
mod feedback;
mod learning;
mod metrics;
mod support;
mod tracking;

pub mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use experiments::Experiments;
pub use feedback::{Bootstrap, Feedback};
pub use learning::Learning;
pub use metrics::StoreMetricsView;
pub use tracking::Tracking;
