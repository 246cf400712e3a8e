//! Batching Server Backend
//!
//! Access to the text-generation server through a common trait, so sessions
//! never depend on HTTP directly.
//!
//! # Usage
//!
//! ```ignore
//! use promptdeck_core::backend::{HttpBackend, QueryBackend};
//! use promptdeck_core::request::{Priority, RequestDraft};
//!
//! let backend = HttpBackend::new("http://localhost:8000")?;
//! let request = RequestDraft::new("ana", "Hello!", Priority::High).to_request();
//! let body = backend.open_query(&request).await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{ByteStream, QueryBackend};
