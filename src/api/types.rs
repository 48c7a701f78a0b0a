// api/types.rs: Request and response bodies for the breakdown backend

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::{Chapter, ContextNote, Segment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub video_id: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub total_segments: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonasResponse {
    pub personas: Vec<Persona>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TocResponse {
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextNotesResponse {
    pub notes: Vec<ContextNote>,
    #[serde(default)]
    pub total: usize,
}

/// Segment as sent back to the generation endpoints (no highlights).
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPayload {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl From<&Segment> for SegmentPayload {
    fn from(segment: &Segment) -> Self {
        Self {
            text: segment.text.clone(),
            start: segment.start,
            duration: segment.duration,
        }
    }
}

/// Body shared by `/api/generate-toc` and `/api/generate-context-notes`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub segments: Vec<SegmentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightStreamRequest {
    pub segments: Vec<SegmentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<Chapter>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub transcript: String,
    pub persona: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedId {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Backend client errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("{detail} (HTTP {status})")]
    Status { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Stream read failed: {0}")]
    Body(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_body() {
            ApiError::Body(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
