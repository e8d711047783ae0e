//! Classifier interface
//!
//! The sentiment and toxicity models are an external capability. Anything that
//! can turn normalized text into a sentiment verdict plus a toxicity
//! distribution implements [`Classifier`]. Implementations are expected to be
//! CPU-bound and blocking; callers on an async runtime must offload them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classifier failures
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Backend could not be reached or started
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// Backend ran but reported a failure
    #[error("Classifier failed: {0}")]
    Backend(String),

    /// Backend output could not be interpreted
    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),

    #[error("Classifier IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Single-label sentiment verdict as emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentVerdict {
    pub label: String,
    pub score: f64,
}

/// One entry of the toxicity distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Raw output of one classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: SentimentVerdict,
    #[serde(default)]
    pub toxicity: Vec<LabelScore>,
}

/// Sentiment model label space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSentiment {
    Negative,
    Neutral,
    Positive,
}

impl RawSentiment {
    /// Interpret a model label
    ///
    /// Accepts the named form and the `LABEL_n` index form of the three-class
    /// twitter sentiment models. Anything unrecognized counts as positive.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "negative" | "label_0" => RawSentiment::Negative,
            "neutral" | "label_1" => RawSentiment::Neutral,
            _ => RawSentiment::Positive,
        }
    }
}

/// Sentiment + toxicity model capability
pub trait Classifier: Send + Sync {
    /// Backend identifier for logs
    fn name(&self) -> &str;

    /// Classify already-normalized text
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}
