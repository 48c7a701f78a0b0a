use reqwest::Url;
use serde::{Deserialize, Serialize};

pub mod segment;

pub use segment::{active_segment, Highlight, Piece, Segment};

/// A generated chapter. `segment_range` is inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_time: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "segmentRange")]
    pub segment_range: [usize; 2],
}

impl Chapter {
    pub fn contains_segment(&self, index: usize) -> bool {
        index >= self.segment_range[0] && index <= self.segment_range[1]
    }
}

/// Chapter playing at `time`: the last one whose `start_time <= time`
/// and whose successor has not started yet.
pub fn chapter_at(chapters: &[Chapter], time: f64) -> Option<usize> {
    chapters.iter().enumerate().position(|(idx, chapter)| {
        let next_start = chapters
            .get(idx + 1)
            .map(|next| next.start_time)
            .unwrap_or(f64::INFINITY);
        time >= chapter.start_time && time < next_start
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Cultural,
    Knowledge,
    SocialConnotation,
    DialectWarning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNote {
    pub segment_index: usize,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub title: String,
    pub note: String,
}

/// Pulls the video id out of a `youtube.com/watch?v=` or `youtu.be/` URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;

    let id = if host.contains("youtu.be") {
        parsed.path().trim_start_matches('/').to_string()
    } else {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())?
    };

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Plain transcript text as sent to the analysis endpoint.
pub fn joined_text(segments: &[impl AsRef<Segment>]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
