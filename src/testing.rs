// In-memory backend used by the unit tests.

use crate::api::{
    ApiError, Backend, ByteStream, ContextNotesResponse, GenerationRequest, Persona, SavedId,
    TocResponse, TranscriptResponse,
};
use crate::deck::{ExpressionRecord, SavedExpression};
use crate::transcript::{Chapter, ContextNote, Segment};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted response of one streaming endpoint.
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    chunks: Vec<Vec<u8>>,
    status: Option<(u16, String)>,
    fail_after: Option<usize>,
    hang_after: Option<usize>,
}

impl StreamScript {
    /// Delivers `body` in reads of at most `size` bytes.
    pub fn split(body: &str, size: usize) -> Self {
        Self {
            chunks: body.as_bytes().chunks(size.max(1)).map(<[u8]>::to_vec).collect(),
            ..Self::default()
        }
    }

    pub fn status(status: u16, detail: &str) -> Self {
        Self {
            status: Some((status, detail.to_string())),
            ..Self::default()
        }
    }

    /// Errors the body after `reads` reads.
    pub fn fail_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }

    /// Stops producing (without ending) after `reads` reads.
    pub fn hang_after(mut self, reads: usize) -> Self {
        self.hang_after = Some(reads);
        self
    }

    fn into_stream(self) -> Result<ByteStream, ApiError> {
        if let Some((status, detail)) = self.status {
            return Err(ApiError::Status { status, detail });
        }

        let limit = self
            .fail_after
            .or(self.hang_after)
            .unwrap_or(self.chunks.len());
        let reads = stream::iter(
            self.chunks
                .into_iter()
                .take(limit)
                .map(|chunk| Ok(Bytes::from(chunk))),
        );

        Ok(if self.fail_after.is_some() {
            reads
                .chain(stream::once(async {
                    Err(ApiError::Body("connection reset".to_string()))
                }))
                .boxed()
        } else if self.hang_after.is_some() {
            reads.chain(stream::pending()).boxed()
        } else {
            reads.boxed()
        })
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub transcript: Option<TranscriptResponse>,
    pub chapters: Option<Vec<Chapter>>,
    pub notes: Option<Vec<ContextNote>>,
    pub personas: Vec<Persona>,
    pub toc_delay: Option<Duration>,
    streams: Mutex<HashMap<String, StreamScript>>,
    /// `(path, body)` of every stream opened.
    pub opened: Mutex<Vec<(String, serde_json::Value)>>,
    pub deck: Mutex<Vec<SavedExpression>>,
}

impl FakeBackend {
    pub fn with_stream(self, path: &str, script: StreamScript) -> Self {
        if let Ok(mut streams) = self.streams.lock() {
            streams.insert(path.to_string(), script);
        }
        self
    }

    pub fn with_transcript(mut self, video_id: &str, texts: &[&str]) -> Self {
        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment::new(*text, i as f64 * 3.0, 3.0))
            .collect();
        self.transcript = Some(TranscriptResponse {
            video_id: video_id.to_string(),
            total_segments: segments.len(),
            segments,
        });
        self
    }

    pub fn opened_paths(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|opened| opened.iter().map(|(path, _)| path.clone()).collect())
            .unwrap_or_default()
    }
}

fn server_error(detail: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        detail: detail.to_string(),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn transcript(&self, _url: &str) -> Result<TranscriptResponse, ApiError> {
        self.transcript.clone().ok_or(ApiError::Status {
            status: 404,
            detail: "No transcript available".to_string(),
        })
    }

    async fn personas(&self) -> Result<Vec<Persona>, ApiError> {
        Ok(self.personas.clone())
    }

    async fn generate_toc(&self, _request: &GenerationRequest) -> Result<TocResponse, ApiError> {
        if let Some(delay) = self.toc_delay {
            tokio::time::sleep(delay).await;
        }
        self.chapters
            .clone()
            .map(|chapters| TocResponse { chapters })
            .ok_or_else(|| server_error("ToC generation failed"))
    }

    async fn generate_context_notes(
        &self,
        _request: &GenerationRequest,
    ) -> Result<ContextNotesResponse, ApiError> {
        self.notes
            .clone()
            .map(|notes| ContextNotesResponse {
                total: notes.len(),
                notes,
            })
            .ok_or_else(|| server_error("Context notes generation failed"))
    }

    async fn open_stream(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ByteStream, ApiError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push((path.to_string(), body));
        }
        let script = self
            .streams
            .lock()
            .ok()
            .and_then(|streams| streams.get(path).cloned())
            .ok_or_else(|| server_error("no stream scripted"))?;
        script.into_stream()
    }

    async fn save_expression(&self, record: &ExpressionRecord) -> Result<SavedId, ApiError> {
        let mut deck = self.deck.lock().map_err(|e| server_error(&e.to_string()))?;
        let id = deck.len() as i64 + 1;
        deck.push(SavedExpression {
            id,
            phrase: record.phrase.clone(),
            register: record.register.clone(),
            level: record.level.clone(),
            frequency: record.frequency.clone(),
            translation: record.translation.clone(),
            alternative: record.alternative.clone(),
            context_sentence: record.context_sentence.clone(),
            video_id: record.video_id.clone(),
            segment_start: record.segment_start,
            created_at: "2024-01-01 00:00:00".to_string(),
        });
        Ok(SavedId { id })
    }

    async fn deck(&self) -> Result<Vec<SavedExpression>, ApiError> {
        Ok(self.deck.lock().map(|d| d.clone()).unwrap_or_default())
    }

    async fn delete_expression(&self, id: i64) -> Result<(), ApiError> {
        let mut deck = self.deck.lock().map_err(|e| server_error(&e.to_string()))?;
        let before = deck.len();
        deck.retain(|e| e.id != id);
        if deck.len() == before {
            return Err(ApiError::Status {
                status: 404,
                detail: "Expression not found".to_string(),
            });
        }
        Ok(())
    }
}
