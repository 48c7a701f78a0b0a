use serde::{Deserialize, Serialize};

/// Payload of a highlight `progress` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    #[serde(default)]
    pub cached_chunks: Option<usize>,
    #[serde(default)]
    pub remaining_chunks: Option<usize>,
    #[serde(default)]
    pub total_chunks: Option<usize>,
    #[serde(default)]
    pub chapter_title: Option<String>,
}

impl ProgressInfo {
    /// Status line for a progress event, if it says anything worth showing.
    pub fn describe(&self) -> Option<String> {
        let remaining = self.remaining_chunks?;
        Some(match self.cached_chunks.filter(|cached| *cached > 0) {
            Some(cached) => format!("{} cached, analyzing {} chapters...", cached, remaining),
            None => format!("Analyzing {} chapters...", remaining),
        })
    }
}

/// Payload of the terminal `done` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneSummary {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub failed_chunks: Vec<String>,
    #[serde(default)]
    pub cached: bool,
    /// Set when the body ended without a `done` event.
    #[serde(skip)]
    pub implicit: bool,
}

impl DoneSummary {
    pub fn implicit() -> Self {
        Self {
            implicit: true,
            ..Self::default()
        }
    }
}

/// Status line after a chunk landed.
pub fn chunk_progress_text(chapter_title: Option<&str>, completed: usize, total: usize) -> String {
    match chapter_title {
        Some(title) => format!("Done: {} ({}/{})", title, completed, total),
        None => format!("{}/{} chunks done", completed, total),
    }
}
