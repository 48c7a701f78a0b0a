use serde::{Deserialize, Deserializer, Serialize};

/// One vocabulary highlight over a segment's text.
///
/// `start`/`end` are char offsets (not byte offsets) into the owning
/// segment's `text`, forming the half-open range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phrase: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub translation: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub level: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    /// Older payloads carry `category` instead of `register`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Highlight {
    pub fn overlaps(&self, other: &Highlight) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn is_well_formed(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }
}

/// A transcript cue. Identity is its position in the loaded transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Plain(&'a str),
    Highlighted {
        text: &'a str,
        highlight: &'a Highlight,
    },
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
            highlights: Vec::new(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Text covered by `highlight`, or `None` when the span falls outside the text.
    pub fn slice(&self, highlight: &Highlight) -> Option<&str> {
        if !highlight.is_well_formed(self.char_len()) {
            return None;
        }
        let from = self.byte_offset(highlight.start)?;
        let to = self.byte_offset(highlight.end)?;
        Some(&self.text[from..to])
    }

    /// Splits the text along the (sorted) highlight list.
    ///
    /// Spans that are malformed or that start before the previous span ended
    /// are skipped rather than rendered twice.
    pub fn pieces(&self) -> Vec<Piece<'_>> {
        let mut pieces = Vec::new();
        let mut cursor = 0usize;

        for highlight in &self.highlights {
            if highlight.start < cursor {
                continue;
            }
            let Some(text) = self.slice(highlight) else {
                continue;
            };
            if highlight.start > cursor {
                if let (Some(from), Some(to)) =
                    (self.byte_offset(cursor), self.byte_offset(highlight.start))
                {
                    pieces.push(Piece::Plain(&self.text[from..to]));
                }
            }
            pieces.push(Piece::Highlighted { text, highlight });
            cursor = highlight.end;
        }

        if let Some(from) = self.byte_offset(cursor) {
            if from < self.text.len() {
                pieces.push(Piece::Plain(&self.text[from..]));
            }
        }

        pieces
    }

    fn byte_offset(&self, char_idx: usize) -> Option<usize> {
        if char_idx == 0 {
            return Some(0);
        }
        self.text
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(self.text.len()))
            .nth(char_idx)
    }
}

/// Index of the segment playing at `time`, if any.
pub fn active_segment(segments: &[impl AsRef<Segment>], time: f64) -> Option<usize> {
    segments.iter().position(|s| s.as_ref().is_active_at(time))
}

impl AsRef<Segment> for Segment {
    fn as_ref(&self) -> &Segment {
        self
    }
}

#[cfg(test)]
pub(crate) fn span(start: usize, end: usize) -> Highlight {
    Highlight {
        phrase: String::new(),
        start,
        end,
        translation: format!("t{start}-{end}"),
        level: "B2".to_string(),
        color: "#d9a88f".to_string(),
        register: None,
        frequency: None,
        alternative: None,
        category: None,
    }
}
