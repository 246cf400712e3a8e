//! Query Backend Trait
//!
//! The transport seam between sessions and the batching server. A session
//! only needs one thing from the outside world: given a request, an ordered
//! stream of body fragments. Keeping that behind a trait lets the registry run
//! against the real HTTP backend or a scripted one in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::BackendError;
use crate::request::GenerationRequest;

/// Ordered body fragments of one streamed response
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

/// Something that can start a streamed generation
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Backend name for logs (e.g. "http")
    fn name(&self) -> &str;

    /// Submit `request` and return its response body as a fragment stream.
    ///
    /// Resolves once the server has accepted the request and started the
    /// body. A non-success status is an error here, never a stream.
    async fn open_query(&self, request: &GenerationRequest) -> Result<ByteStream, BackendError>;
}
