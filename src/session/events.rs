use serde::Deserialize;

use super::progress::{DoneSummary, ProgressInfo};
use crate::highlight::ChunkResult;
use crate::sse::SseFrame;

pub const CHUNK_RESULT: &str = "chunk_result";
pub const PROGRESS: &str = "progress";
pub const DONE: &str = "done";
pub const LAYER0: &str = "layer0";
pub const BREAKDOWN: &str = "breakdown";
pub const ERROR: &str = "error";

/// Typed view of a highlight-stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightEvent {
    Chunk(ChunkResult),
    Progress(ProgressInfo),
    Done(DoneSummary),
}

impl HighlightEvent {
    /// `Ok(None)` for event names this stream does not use.
    pub fn parse(frame: &SseFrame) -> Result<Option<Self>, serde_json::Error> {
        let event = match frame.event.as_str() {
            CHUNK_RESULT => Self::Chunk(serde_json::from_str(&frame.data)?),
            PROGRESS => Self::Progress(serde_json::from_str(&frame.data)?),
            DONE => Self::Done(serde_json::from_str(&frame.data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[derive(Deserialize)]
struct Content {
    content: String,
}

/// Typed view of an analysis-stream frame. `Done` is handled by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    Progress(String),
    Layer0(String),
    Breakdown(String),
    /// Reported in-band by the server; the stream keeps going.
    Error(String),
}

impl AnalysisEvent {
    pub fn parse(frame: &SseFrame) -> Result<Option<Self>, serde_json::Error> {
        let event = match frame.event.as_str() {
            PROGRESS => Self::Progress(frame.data.clone()),
            LAYER0 => Self::Layer0(serde_json::from_str::<Content>(&frame.data)?.content),
            BREAKDOWN => Self::Breakdown(serde_json::from_str::<Content>(&frame.data)?.content),
            ERROR => Self::Error(frame.data.clone()),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
