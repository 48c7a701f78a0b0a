use serde::{Deserialize, Serialize};

use crate::transcript::{Highlight, Segment};

/// Body of `/api/deck/save`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionRecord {
    pub phrase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_sentence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_start: Option<f64>,
}

impl ExpressionRecord {
    /// Record for a highlight as shown in `segment`.
    ///
    /// The phrase is the text actually covered by the span when it can be
    /// resolved, otherwise whatever phrase the backend attached.
    pub fn from_highlight(segment: &Segment, highlight: &Highlight, video_id: Option<&str>) -> Self {
        let phrase = segment
            .slice(highlight)
            .map(str::to_string)
            .unwrap_or_else(|| highlight.phrase.clone());

        Self {
            phrase,
            register: highlight.register.clone().or_else(|| highlight.category.clone()),
            level: non_empty(&highlight.level),
            frequency: highlight.frequency.clone(),
            translation: non_empty(&highlight.translation),
            alternative: highlight.alternative.clone(),
            context_sentence: Some(segment.text.clone()),
            video_id: video_id.map(str::to_string),
            segment_start: Some(segment.start),
        }
    }
}

/// A stored deck entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedExpression {
    pub id: i64,
    pub phrase: String,
    #[serde(default)]
    pub register: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub alternative: Option<String>,
    #[serde(default)]
    pub context_sentence: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub segment_start: Option<f64>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeckResponse {
    pub expressions: Vec<SavedExpression>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::segment::span;

    #[test]
    fn record_uses_covered_text_and_context() {
        let mut seg = Segment::new("break a leg tonight", 12.5, 3.0);
        let mut h = span(0, 11);
        h.phrase = "stale".to_string();
        h.category = Some("idiom".to_string());
        seg.highlights = vec![h.clone()];

        let record = ExpressionRecord::from_highlight(&seg, &h, Some("vid1"));

        assert_eq!(record.phrase, "break a leg");
        assert_eq!(record.register.as_deref(), Some("idiom"));
        assert_eq!(record.context_sentence.as_deref(), Some("break a leg tonight"));
        assert_eq!(record.segment_start, Some(12.5));
        assert_eq!(record.video_id.as_deref(), Some("vid1"));
    }

    #[test]
    fn saved_expression_tolerates_missing_optionals() {
        let parsed: DeckResponse = serde_json::from_str(
            r#"{"expressions":[{"id":3,"phrase":"on the fence","translation":null,"created_at":"2024-05-01 10:00:00"}],"total":1}"#,
        )
        .unwrap();
        assert_eq!(parsed.expressions[0].id, 3);
        assert!(parsed.expressions[0].translation.is_none());
    }

    #[test]
    fn empty_optionals_are_not_serialized() {
        let record = ExpressionRecord {
            phrase: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"phrase":"x"}"#);
    }
}
