use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod mapper;
pub mod merge;

pub use mapper::{apply_chunk, MergeOutcome};
pub use merge::{merge_spans, merge_spans_counted};

use crate::transcript::Highlight;

/// Payload of a `chunk_result` event.
///
/// Segment indices stay string-encoded as they arrive; the mapper decides
/// which of them are usable. Spans that do not decode are dropped one by one
/// so the rest of the chunk survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    #[serde(default, deserialize_with = "lenient_spans")]
    pub highlights: BTreeMap<String, Vec<Highlight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Older servers report the count as `total`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default)]
    pub chapter_title: Option<String>,
}

fn lenient_spans<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<Highlight>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;

    let mut spans = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let serde_json::Value::Array(items) = value else {
            tracing::debug!("Segment '{}': span list is not an array", key);
            continue;
        };
        let parsed: Vec<Highlight> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(highlight) => Some(highlight),
                Err(e) => {
                    tracing::debug!("Segment '{}': skipping undecodable span: {}", key, e);
                    None
                }
            })
            .collect();
        spans.insert(key, parsed);
    }
    Ok(spans)
}

impl ChunkResult {
    pub fn span_count(&self) -> usize {
        self.highlights.values().map(Vec::len).sum()
    }

    /// Count as reported by the backend (`count`, then `total`), falling
    /// back to the payload size.
    pub fn reported_count(&self) -> usize {
        self.count
            .or(self.total)
            .unwrap_or_else(|| self.span_count())
    }
}
