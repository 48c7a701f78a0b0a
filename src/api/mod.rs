// api/mod.rs: Backend trait + HTTP implementation

mod http;
mod types;

pub use http::HttpBackend;
pub use types::{
    AnalyzeRequest, ApiError, ContextNotesResponse, GenerationRequest, HighlightStreamRequest,
    Persona, PersonasResponse, SavedId, SegmentPayload, TocResponse, TranscriptResponse,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

use crate::deck::{ExpressionRecord, SavedExpression};

pub const ANALYZE_PATH: &str = "/api/analyze";
pub const HIGHLIGHTS_STREAM_PATH: &str = "/api/generate-highlights-stream";

/// Raw body of a streaming response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// Everything the client needs from the breakdown server
#[async_trait]
pub trait Backend: Send + Sync {
    async fn transcript(&self, url: &str) -> Result<TranscriptResponse, ApiError>;

    async fn personas(&self) -> Result<Vec<Persona>, ApiError>;

    async fn generate_toc(&self, request: &GenerationRequest) -> Result<TocResponse, ApiError>;

    async fn generate_context_notes(
        &self,
        request: &GenerationRequest,
    ) -> Result<ContextNotesResponse, ApiError>;

    /// POSTs `body` to an SSE endpoint and hands back the response body.
    ///
    /// Resolves only once the status line is known; a non-success status is
    /// an error, never an empty stream.
    async fn open_stream(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ByteStream, ApiError>;

    async fn save_expression(&self, record: &ExpressionRecord) -> Result<SavedId, ApiError>;

    async fn deck(&self) -> Result<Vec<SavedExpression>, ApiError>;

    async fn delete_expression(&self, id: i64) -> Result<(), ApiError>;
}
