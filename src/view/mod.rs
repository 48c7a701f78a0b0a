use serde::Serialize;
use std::sync::Arc;

pub mod highlights;

pub use highlights::{HighlightProgress, HighlightsResult};

use crate::highlight::{apply_chunk, ChunkResult};
use crate::session::{AnalysisEvent, DoneSummary, ProgressInfo};
use crate::transcript::{Chapter, ContextNote, Segment};

/// Something one of the per-video pipelines produced.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A new load started; everything from older generations is stale.
    Reset { video_id: String },
    TranscriptLoaded { video_id: String, segments: Vec<Segment> },
    LoadFailed(String),
    TocStarted,
    TocReady(Vec<Chapter>),
    TocFailed(String),
    NotesStarted,
    NotesReady(Vec<ContextNote>),
    NotesFailed(String),
    HighlightsStarted { total_chunks: usize },
    HighlightChunk(ChunkResult),
    HighlightProgress(ProgressInfo),
    HighlightsDone(DoneSummary),
    HighlightsFailed(String),
    Tick,
    AnalysisStarted,
    Analysis(AnalysisEvent),
    AnalysisDone,
    AnalysisFailed(String),
    /// The user tore the view down or replaced the video.
    Aborted,
}

/// A pipeline event stamped with the load it belongs to.
#[derive(Debug, Clone)]
pub struct Tagged<E> {
    pub generation: u64,
    pub event: E,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisView {
    pub running: bool,
    pub progress: String,
    pub layer0: String,
    pub breakdown: String,
    pub error: Option<String>,
}

/// Everything the screen shows for the current video.
///
/// All mutation goes through [`VideoSession::apply`], which also drops events
/// from superseded loads.
#[derive(Debug, Clone, Default)]
pub struct VideoSession {
    generation: u64,
    pub video_id: String,
    pub segments: Vec<Arc<Segment>>,
    pub chapters: Vec<Chapter>,
    pub toc: Phase,
    pub context_notes: Vec<ContextNote>,
    pub notes: Phase,
    pub highlights: HighlightProgress,
    pub analysis: AnalysisView,
    pub load_error: Option<String>,
}

impl VideoSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Applies one event; returns `false` if it was stale or changed nothing.
    pub fn apply(&mut self, tagged: Tagged<PipelineEvent>) -> bool {
        if let PipelineEvent::Reset { video_id } = tagged.event {
            if tagged.generation < self.generation {
                return false;
            }
            *self = Self {
                generation: tagged.generation,
                video_id,
                ..Self::default()
            };
            return true;
        }

        if tagged.generation != self.generation {
            tracing::trace!(
                "Dropping stale event from generation {} (current {})",
                tagged.generation,
                self.generation
            );
            return false;
        }

        self.reduce(tagged.event)
    }

    fn reduce(&mut self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::Reset { .. } => return false,
            PipelineEvent::TranscriptLoaded { video_id, segments } => {
                if !video_id.is_empty() {
                    self.video_id = video_id;
                }
                self.segments = segments.into_iter().map(Arc::new).collect();
                self.load_error = None;
            }
            PipelineEvent::LoadFailed(message) => self.load_error = Some(message),
            PipelineEvent::TocStarted => self.toc = Phase::Pending,
            PipelineEvent::TocReady(chapters) => {
                self.chapters = chapters;
                self.toc = Phase::Ready;
            }
            PipelineEvent::TocFailed(_) => self.toc = Phase::Failed,
            PipelineEvent::NotesStarted => self.notes = Phase::Pending,
            PipelineEvent::NotesReady(notes) => {
                self.context_notes = notes;
                self.notes = Phase::Ready;
            }
            PipelineEvent::NotesFailed(_) => self.notes = Phase::Failed,
            PipelineEvent::HighlightsStarted { total_chunks } => self.highlights.start(total_chunks),
            PipelineEvent::HighlightChunk(chunk) => {
                if !self.highlights.is_active() {
                    return false;
                }
                let outcome = apply_chunk(&self.segments, &chunk);
                self.segments = outcome.segments;
                self.highlights.record_chunk(
                    outcome.accepted,
                    chunk.reported_count(),
                    chunk.chapter_title.as_deref(),
                );
            }
            PipelineEvent::HighlightProgress(info) => {
                if !self.highlights.is_active() {
                    return false;
                }
                self.highlights.record_progress(&info);
            }
            PipelineEvent::HighlightsDone(summary) => {
                if !self.highlights.is_active() {
                    return false;
                }
                self.highlights.finish(summary);
            }
            PipelineEvent::HighlightsFailed(message) => {
                if !self.highlights.is_active() {
                    return false;
                }
                tracing::warn!("AI highlights streaming failed: {}", message);
                self.highlights.fail(message);
            }
            PipelineEvent::Tick => return self.highlights.tick(),
            PipelineEvent::AnalysisStarted => {
                self.analysis = AnalysisView {
                    running: true,
                    progress: "Starting analysis...".to_string(),
                    ..AnalysisView::default()
                };
            }
            PipelineEvent::Analysis(event) => match event {
                AnalysisEvent::Progress(text) => self.analysis.progress = text,
                AnalysisEvent::Layer0(content) => self.analysis.layer0 = content,
                AnalysisEvent::Breakdown(content) => self.analysis.breakdown = content,
                AnalysisEvent::Error(message) => self.analysis.error = Some(message),
            },
            PipelineEvent::AnalysisDone => {
                self.analysis.running = false;
                self.analysis.progress.clear();
            }
            PipelineEvent::AnalysisFailed(message) => {
                self.analysis.running = false;
                self.analysis.error = Some(message);
            }
            PipelineEvent::Aborted => {
                self.highlights.abort();
                self.analysis.running = false;
            }
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.toc != Phase::Pending
            && self.notes != Phase::Pending
            && !self.highlights.is_active()
            && !self.analysis.running
    }

    pub fn highlight_count(&self) -> usize {
        self.segments.iter().map(|s| s.highlights.len()).sum()
    }

    /// Notes attached to the segment at `index`.
    pub fn notes_for(&self, index: usize) -> impl Iterator<Item = &ContextNote> {
        self.context_notes
            .iter()
            .filter(move |note| note.segment_index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::segment::span;
    use std::collections::BTreeMap;

    fn tagged(generation: u64, event: PipelineEvent) -> Tagged<PipelineEvent> {
        Tagged { generation, event }
    }

    fn loaded(generation: u64) -> VideoSession {
        let mut view = VideoSession::new();
        view.apply(tagged(generation, PipelineEvent::Reset { video_id: "v".into() }));
        view.apply(tagged(
            generation,
            PipelineEvent::TranscriptLoaded {
                video_id: String::new(),
                segments: vec![
                    Segment::new("first line of the video", 0.0, 2.0),
                    Segment::new("second line of the video", 2.0, 2.0),
                ],
            },
        ));
        view
    }

    fn chunk(segment: &str, spans: Vec<crate::transcript::Highlight>) -> ChunkResult {
        ChunkResult {
            highlights: BTreeMap::from([(segment.to_string(), spans)]),
            count: None,
            total: None,
            chapter_title: None,
        }
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut view = loaded(2);
        view.apply(tagged(2, PipelineEvent::HighlightsStarted { total_chunks: 1 }));

        assert!(!view.apply(tagged(1, PipelineEvent::HighlightChunk(chunk("0", vec![span(0, 5)])))));
        assert_eq!(view.highlight_count(), 0);

        assert!(!view.apply(tagged(1, PipelineEvent::Reset { video_id: "old".into() })));
        assert_eq!(view.video_id, "v");
    }

    #[test]
    fn chunks_merge_into_current_segments() {
        let mut view = loaded(1);
        view.apply(tagged(1, PipelineEvent::HighlightsStarted { total_chunks: 2 }));

        view.apply(tagged(1, PipelineEvent::HighlightChunk(chunk("0", vec![span(0, 5), span(3, 8)]))));
        view.apply(tagged(1, PipelineEvent::HighlightChunk(chunk("0", vec![span(6, 11)]))));

        let ranges: Vec<_> = view.segments[0].highlights.iter().map(|h| (h.start, h.end)).collect();
        assert_eq!(ranges, vec![(0, 5), (6, 11)]);
        assert_eq!(view.highlights.merged_total, 2);
        assert_eq!(view.highlights.text, "2/2 chunks done");
    }

    #[test]
    fn done_stops_the_clock_and_ignores_late_chunks() {
        let mut view = loaded(1);
        view.apply(tagged(1, PipelineEvent::HighlightsStarted { total_chunks: 0 }));
        view.apply(tagged(1, PipelineEvent::Tick));
        view.apply(tagged(1, PipelineEvent::HighlightsDone(DoneSummary::default())));

        assert!(!view.apply(tagged(1, PipelineEvent::Tick)));
        assert!(!view.apply(tagged(1, PipelineEvent::HighlightChunk(chunk("1", vec![span(0, 3)])))));
        assert_eq!(view.highlights.elapsed_secs, 1);
        assert_eq!(view.highlight_count(), 0);
    }

    #[test]
    fn reset_clears_everything_including_totals() {
        let mut view = loaded(1);
        view.apply(tagged(1, PipelineEvent::HighlightsStarted { total_chunks: 0 }));
        view.apply(tagged(1, PipelineEvent::HighlightChunk(chunk("0", vec![span(0, 5)]))));
        view.apply(tagged(2, PipelineEvent::Reset { video_id: "next".into() }));

        assert_eq!(view.generation(), 2);
        assert!(view.segments.is_empty());
        assert_eq!(view.highlights.merged_total, 0);
    }

    #[test]
    fn analysis_events_fill_the_panel() {
        let mut view = loaded(1);
        view.apply(tagged(1, PipelineEvent::AnalysisStarted));
        view.apply(tagged(1, PipelineEvent::Analysis(AnalysisEvent::Layer0("L0".into()))));
        view.apply(tagged(1, PipelineEvent::Analysis(AnalysisEvent::Error("partial".into()))));
        assert!(view.analysis.running);

        view.apply(tagged(1, PipelineEvent::AnalysisDone));
        assert!(!view.analysis.running);
        assert_eq!(view.analysis.layer0, "L0");
        assert_eq!(view.analysis.error.as_deref(), Some("partial"));
    }
}
