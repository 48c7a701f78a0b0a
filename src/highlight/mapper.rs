use std::sync::Arc;

use super::merge::merge_spans_counted;
use super::ChunkResult;
use crate::transcript::{Highlight, Segment};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub segments: Vec<Arc<Segment>>,
    /// Spans newly accepted across every touched segment.
    pub accepted: usize,
}

/// Applies one chunk to the segment list, returning a new list.
///
/// Segments the chunk does not touch are shared with the input (same `Arc`).
/// Unknown indices, empty span lists and spans that do not fit the segment's
/// text are skipped.
pub fn apply_chunk(segments: &[Arc<Segment>], chunk: &ChunkResult) -> MergeOutcome {
    let mut updated = segments.to_vec();
    let mut accepted = 0usize;

    for (key, candidates) in &chunk.highlights {
        let Some(idx) = key.parse::<usize>().ok().filter(|idx| *idx < updated.len()) else {
            tracing::debug!("Skipping chunk entry for unknown segment '{}'", key);
            continue;
        };
        if candidates.is_empty() {
            continue;
        }

        let segment = &updated[idx];
        let text_len = segment.char_len();
        let usable: Vec<Highlight> = candidates
            .iter()
            .filter(|h| h.is_well_formed(text_len))
            .cloned()
            .collect();
        if usable.len() < candidates.len() {
            tracing::debug!(
                "Segment {}: dropped {} malformed span(s)",
                idx,
                candidates.len() - usable.len()
            );
        }
        if usable.is_empty() {
            continue;
        }

        let (highlights, added) = merge_spans_counted(&segment.highlights, &usable);
        accepted += added;
        if added == 0 {
            continue;
        }

        updated[idx] = Arc::new(Segment {
            highlights,
            ..Segment::clone(segment)
        });
    }

    MergeOutcome {
        segments: updated,
        accepted,
    }
}
