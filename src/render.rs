// Plain-text rendering of a `VideoSession` for the terminal.

use std::fmt::Write as _;

use crate::transcript::{Piece, Segment};
use crate::view::{Phase, VideoSession};

/// `mm:ss`, or `h:mm:ss` past the hour.
pub fn timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Segment text with every highlight wrapped in brackets.
pub fn marked_text(segment: &Segment) -> String {
    segment
        .pieces()
        .into_iter()
        .map(|piece| match piece {
            Piece::Plain(text) => text.to_string(),
            Piece::Highlighted { text, .. } => format!("[{}]", text),
        })
        .collect()
}

/// Status lines of the pipelines, in display order.
pub fn status_lines(view: &VideoSession) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(error) = &view.load_error {
        lines.push(format!("Load failed: {}", error));
        return lines;
    }

    match view.toc {
        Phase::Pending => lines.push("Generating chapters...".to_string()),
        Phase::Failed => lines.push("Chapters unavailable".to_string()),
        Phase::Idle | Phase::Ready => {}
    }
    if let Some(line) = view.highlights.status_line() {
        lines.push(line);
    }
    if view.notes == Phase::Pending {
        lines.push("Generating context notes...".to_string());
    }
    if view.analysis.running && !view.analysis.progress.is_empty() {
        lines.push(view.analysis.progress.clone());
    }
    lines
}

/// Full transcript with chapter headings, highlights and notes.
pub fn transcript(view: &VideoSession) -> String {
    let mut out = String::new();

    for (index, segment) in view.segments.iter().enumerate() {
        if let Some(chapter) = view
            .chapters
            .iter()
            .find(|chapter| chapter.segment_range[0] == index)
        {
            let _ = writeln!(out, "\n## {} ({})", chapter.title, timestamp(chapter.start_time));
            if !chapter.summary.is_empty() {
                let _ = writeln!(out, "   {}", chapter.summary);
            }
        }

        let _ = writeln!(out, "[{}] {}", timestamp(segment.start), marked_text(segment));
        for highlight in &segment.highlights {
            let phrase = segment.slice(highlight).unwrap_or(&highlight.phrase);
            let mut line = format!("    * {}", phrase);
            if !highlight.translation.is_empty() {
                let _ = write!(line, ": {}", highlight.translation);
            }
            if !highlight.level.is_empty() {
                let _ = write!(line, " ({})", highlight.level);
            }
            let _ = writeln!(out, "{}", line);
        }
        for note in view.notes_for(index) {
            let _ = writeln!(out, "    > {}: {}", note.title, note.note);
        }
    }
    out
}

/// Analysis panel: overview first, then the detailed breakdown.
pub fn analysis(view: &VideoSession) -> Option<String> {
    let panel = &view.analysis;
    if panel.layer0.is_empty() && panel.breakdown.is_empty() && panel.error.is_none() {
        return None;
    }

    let mut out = String::new();
    if !panel.layer0.is_empty() {
        let _ = writeln!(out, "{}\n", panel.layer0.trim_end());
    }
    if !panel.breakdown.is_empty() {
        let _ = writeln!(out, "{}", panel.breakdown.trim_end());
    }
    if let Some(error) = &panel.error {
        let _ = writeln!(out, "\nAnalysis error: {}", error);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::segment::span;
    use crate::transcript::Chapter;
    use crate::view::{PipelineEvent, Tagged};
    use std::sync::Arc;

    #[test]
    fn timestamps() {
        assert_eq!(timestamp(0.0), "00:00");
        assert_eq!(timestamp(75.9), "01:15");
        assert_eq!(timestamp(3725.0), "1:02:05");
    }

    #[test]
    fn marks_highlights_by_char_offset() {
        let mut segment = Segment::new("café au lait", 0.0, 1.0);
        segment.highlights = vec![span(0, 4), span(8, 12)];
        assert_eq!(marked_text(&segment), "[café] au [lait]");
    }

    #[test]
    fn transcript_puts_chapter_headings_before_their_first_segment() {
        let mut view = VideoSession::new();
        view.apply(Tagged {
            generation: 0,
            event: PipelineEvent::TocReady(vec![Chapter {
                title: "Second half".to_string(),
                start_time: 62.0,
                summary: String::new(),
                segment_range: [1, 1],
            }]),
        });
        view.segments = vec![
            Arc::new(Segment::new("one", 0.0, 62.0)),
            Arc::new(Segment::new("two", 62.0, 3.0)),
        ];

        let text = transcript(&view);
        let heading = text.find("## Second half (01:02)").unwrap();
        assert!(text.find("[00:00] one").unwrap() < heading);
        assert!(heading < text.find("[01:02] two").unwrap());
    }

    #[test]
    fn load_error_hides_other_status() {
        let mut view = VideoSession::new();
        view.load_error = Some("No transcript available".to_string());
        assert_eq!(
            status_lines(&view),
            vec!["Load failed: No transcript available".to_string()]
        );
    }
}
