//! Data model shared by the server and the reporting side
//!
//! `AnalysisRecord` is the unit that travels through the ingestion queue and
//! lands as one row in the dataset file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One chat message as received at intake
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub author: String,
    pub raw_text: String,
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            raw_text: raw_text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Final sentiment verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final toxicity verdict
///
/// Two vocabularies coexist: the model threshold yields `TOXIC`/`NOT_TOXIC`,
/// while the lexical override re-derives the label as `toxic`/`non-toxic`.
/// Downstream readers see four distinct values and must not fold them together
/// until the naming is settled with the dashboard owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToxicityLabel {
    #[serde(rename = "TOXIC")]
    Toxic,
    #[serde(rename = "NOT_TOXIC")]
    NotToxic,
    #[serde(rename = "toxic")]
    LexicalToxic,
    #[serde(rename = "non-toxic")]
    LexicalNonToxic,
}

impl ToxicityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToxicityLabel::Toxic => "TOXIC",
            ToxicityLabel::NotToxic => "NOT_TOXIC",
            ToxicityLabel::LexicalToxic => "toxic",
            ToxicityLabel::LexicalNonToxic => "non-toxic",
        }
    }
}

impl fmt::Display for ToxicityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified chat message
///
/// Score fields are `None` when classification failed; a non-null `error`
/// means the numeric fields carry no reliable information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub original_message: Option<String>,
    pub cleaned_message: Option<String>,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_score: Option<f64>,
    pub toxicity_label: Option<ToxicityLabel>,
    pub toxicity_score: Option<f64>,
    pub contains_negative_word: Option<bool>,
    pub error: Option<String>,
}

impl AnalysisRecord {
    /// Record with neutral/zero scores and an error message
    pub fn neutral_with_error(cleaned_message: Option<String>, error: impl Into<String>) -> Self {
        Self {
            cleaned_message,
            sentiment_label: Some(SentimentLabel::Neutral),
            sentiment_score: Some(0.0),
            toxicity_label: Some(ToxicityLabel::NotToxic),
            toxicity_score: Some(0.0),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Stamp intake metadata onto a synthesized record
    pub fn stamped(mut self, message: &ChatMessage, timestamp: String) -> Self {
        self.timestamp = Some(timestamp);
        self.author = Some(message.author.clone());
        self.original_message = Some(message.raw_text.clone());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
