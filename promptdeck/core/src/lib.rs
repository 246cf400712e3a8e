//! Promptdeck Core - Headless Streaming Client for a Batching Text Backend
//!
//! This crate holds everything a surface (CLI, TUI, web view) needs to submit
//! prompts to a priority-batching generation server and watch the answers
//! stream back, with no UI code of its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Surfaces                             │
//! │      drafts ──▶ submit_one / submit_all      ◀── handles      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │                     SessionRegistry                           │
//! │   RequestId ─▶ RequestSession (Idle → Submitting → Streaming  │
//! │                                 → Completed | Failed)         │
//! │        │ one task per session                                 │
//! │        ▼                                                      │
//! │   QueryBackend::open_query ──▶ StreamDecoder ──▶ apply(event) │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ HTTP
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Batching server: /v1/query  /v1/analytics  /v1/chat          │
//! │                   /v1/settings  /health                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionRegistry`]: owns live sessions and drives them concurrently
//! - [`RequestSession`]: pure per-request state machine
//! - [`StreamDecoder`]: incremental `data: {json}` line decoder
//! - [`HttpBackend`]: reqwest client for all server endpoints
//!
//! # Quick Start
//!
//! ```ignore
//! use promptdeck_core::{HttpBackend, Priority, RequestDraft, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = promptdeck_core::config::load_config()?;
//!     let registry = SessionRegistry::new(HttpBackend::from_config(&config)?);
//!
//!     let handles = registry.submit_all(&[
//!         RequestDraft::new("ana", "Summarise Rust ownership", Priority::High),
//!         RequestDraft::new("bo", "Write a haiku", Priority::Low),
//!     ]);
//!
//!     for handle in handles {
//!         let session = handle.wait().await;
//!         println!("{}: {}", session.state().label(), session.visible_output());
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod registry;
pub mod request;
pub mod session;
pub mod streaming;

pub use api::{
    AnalyticsResponse, ChatHistoryItem, HealthResponse, PriorityDistributionItem,
    PriorityThreshold, SettingsUpdate, TimeSeriesPoint,
};
pub use backend::{ByteStream, HttpBackend, QueryBackend};
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use error::{BackendError, FailureKind, ProtocolError, SessionFailure};
pub use registry::{prepare_batch, RegistrySummary, SessionHandle, SessionRegistry};
pub use request::{GenerationRequest, GenerationResult, Priority, RequestDraft, RequestId};
pub use session::{RequestSession, SessionOutcome, SessionState};
pub use streaming::{ResponseAccumulator, StreamDecoder, StreamEvent};
