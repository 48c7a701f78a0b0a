use serde::Serialize;
use std::time::Instant;

use crate::session::progress::chunk_progress_text;
use crate::session::{DoneSummary, ProgressInfo, SessionState};

/// Final numbers shown once the highlight stream settled successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightsResult {
    /// Spans actually merged into the transcript.
    pub count: usize,
    pub seconds: u64,
    pub summary: DoneSummary,
}

/// Display state of the highlight session of the current video.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HighlightProgress {
    pub state: SessionState,
    pub elapsed_secs: u64,
    pub merged_total: usize,
    /// Sum of the counts the backend reported per chunk.
    pub reported_total: usize,
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub text: String,
    pub result: Option<HighlightsResult>,
    pub error: Option<String>,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl HighlightProgress {
    pub(crate) fn start(&mut self, total_chunks_hint: usize) {
        *self = Self {
            state: SessionState::Active,
            total_chunks: total_chunks_hint,
            started_at: Some(Instant::now()),
            ..Self::default()
        };
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub(crate) fn tick(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.elapsed_secs += 1;
        true
    }

    pub(crate) fn record_chunk(&mut self, accepted: usize, reported: usize, chapter: Option<&str>) {
        self.merged_total += accepted;
        self.reported_total += reported;
        self.completed_chunks += 1;
        if self.total_chunks > 0 {
            self.text = chunk_progress_text(chapter, self.completed_chunks, self.total_chunks);
        }
    }

    pub(crate) fn record_progress(&mut self, info: &ProgressInfo) {
        if info.remaining_chunks.is_none() {
            return;
        }
        if let Some(total) = info.total_chunks.filter(|total| *total > 0) {
            self.total_chunks = total;
        }
        if let Some(text) = info.describe() {
            self.text = text;
        }
    }

    pub(crate) fn finish(&mut self, summary: DoneSummary) {
        let seconds = self
            .started_at
            .map(|started| started.elapsed().as_secs_f64().round() as u64)
            .unwrap_or(self.elapsed_secs);

        if summary.implicit && self.total_chunks > 0 && self.completed_chunks < self.total_chunks {
            tracing::warn!(
                "Highlight stream ended early: {}/{} chunks",
                self.completed_chunks,
                self.total_chunks
            );
        }

        self.state = SessionState::Completed;
        self.text.clear();
        self.result = Some(HighlightsResult {
            count: self.merged_total,
            seconds,
            summary,
        });
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.state = SessionState::Errored;
        self.text.clear();
        self.error = Some(message);
    }

    /// Stream ended early by the user (new load or teardown).
    pub(crate) fn abort(&mut self) {
        if self.is_active() {
            self.state = SessionState::Aborted;
            self.text.clear();
        }
    }

    /// Short status line for the renderer.
    pub fn status_line(&self) -> Option<String> {
        match self.state {
            SessionState::Idle | SessionState::Aborted => None,
            SessionState::Active if self.text.is_empty() => {
                Some(format!("Generating highlights... {}s", self.elapsed_secs))
            }
            SessionState::Active => Some(format!("{} ({}s)", self.text, self.elapsed_secs)),
            SessionState::Completed => self.result.as_ref().map(|result| {
                let mut line = format!("{} highlights in {}s", result.count, result.seconds);
                if !result.summary.failed_chunks.is_empty() {
                    line.push_str(&format!(
                        ", {} chunk(s) failed",
                        result.summary.failed_chunks.len()
                    ));
                }
                if result.summary.implicit {
                    line.push_str(" (stream ended without summary)");
                }
                line
            }),
            SessionState::Errored => Some("Highlights unavailable".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_only_while_active() {
        let mut progress = HighlightProgress::default();
        assert!(!progress.tick());

        progress.start(0);
        assert!(progress.tick());
        assert!(progress.tick());
        assert_eq!(progress.elapsed_secs, 2);

        progress.finish(DoneSummary::default());
        assert!(!progress.tick());
        assert_eq!(progress.elapsed_secs, 2);
    }

    #[test]
    fn chunk_text_needs_a_known_total() {
        let mut progress = HighlightProgress::default();
        progress.start(0);
        progress.record_chunk(3, 3, Some("Intro"));
        assert!(progress.text.is_empty());

        progress.record_progress(&ProgressInfo {
            remaining_chunks: Some(3),
            total_chunks: Some(4),
            cached_chunks: Some(1),
            chapter_title: None,
        });
        assert_eq!(progress.text, "1 cached, analyzing 3 chapters...");

        progress.record_chunk(2, 5, Some("Body"));
        assert_eq!(progress.text, "Done: Body (2/4)");
        assert_eq!(progress.merged_total, 5);
        assert_eq!(progress.reported_total, 8);
    }

    #[test]
    fn finish_keeps_running_total() {
        let mut progress = HighlightProgress::default();
        progress.start(2);
        progress.record_chunk(4, 4, None);
        progress.record_chunk(1, 2, None);
        progress.finish(DoneSummary::implicit());

        let result = progress.result.as_ref().unwrap();
        assert_eq!(result.count, 5);
        assert!(progress.text.is_empty());
        assert!(progress.status_line().unwrap().contains("without summary"));
    }

    #[test]
    fn abort_only_applies_to_active_sessions() {
        let mut progress = HighlightProgress::default();
        progress.start(1);
        progress.finish(DoneSummary::default());
        progress.abort();
        assert_eq!(progress.state, SessionState::Completed);
    }
}
