//! Score synthesis
//!
//! Merges the sentiment verdict, the toxicity distribution and the lexical
//! negative-word signal into one [`AnalysisRecord`].

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::classifier::{Classification, Classifier, LabelScore, RawSentiment, SentimentVerdict};
use super::lexicon::detect_negative_words;
use super::normalize::normalize;
use crate::model::{AnalysisRecord, SentimentLabel, ToxicityLabel};

/// Model probability above which a message is `TOXIC`
pub const TOXIC_THRESHOLD: f64 = 0.5;

/// Lexical boost is skipped at or above this score
pub const LEXICAL_GATE: f64 = 0.8;

/// Amount added to the toxicity score on a lexicon hit
pub const LEXICAL_BOOST: f64 = 0.2;

pub const MODELS_NOT_LOADED: &str = "Models are not loaded.";
pub const EMPTY_MESSAGE: &str = "Empty message";

/// Turns raw chat text into a scored record
#[derive(Clone)]
pub struct ScoreSynthesizer {
    classifier: Option<Arc<dyn Classifier>>,
}

impl ScoreSynthesizer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    /// Synthesizer without a model backend; every record reports the fault
    pub fn unloaded() -> Self {
        Self { classifier: None }
    }

    pub fn models_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    /// Analyze one message
    ///
    /// Never fails: problems are reported through the record's `error` field.
    pub fn analyze(&self, raw_text: &str) -> AnalysisRecord {
        let Some(classifier) = self.classifier.as_ref() else {
            error!("Models are not loaded; message left unscored");
            return AnalysisRecord::neutral_with_error(None, MODELS_NOT_LOADED);
        };

        let cleaned = normalize(raw_text);
        if cleaned.is_empty() {
            return AnalysisRecord::neutral_with_error(Some(cleaned), EMPTY_MESSAGE);
        }

        match classifier.classify(&cleaned) {
            Ok(classification) => synthesize(cleaned, &classification),
            Err(e) => {
                warn!(classifier = classifier.name(), "Error during analysis: {}", e);
                AnalysisRecord {
                    cleaned_message: Some(cleaned),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}

/// Build the scored record from a successful classification
fn synthesize(cleaned: String, classification: &Classification) -> AnalysisRecord {
    let (sentiment_label, sentiment_score) = remap_sentiment(&classification.sentiment);

    let toxicity_score = toxic_probability(&classification.toxicity);
    let toxicity_label = threshold_label(toxicity_score);

    let hits = detect_negative_words(&cleaned);
    let (toxicity_score, toxicity_label) =
        apply_lexical_override(toxicity_score, toxicity_label, !hits.is_empty());

    debug!(
        sentiment = %sentiment_label,
        toxicity = %toxicity_label,
        negative_words = hits.len(),
        "Message scored"
    );

    AnalysisRecord {
        cleaned_message: Some(cleaned),
        sentiment_label: Some(sentiment_label),
        sentiment_score: Some(sentiment_score),
        toxicity_label: Some(toxicity_label),
        toxicity_score: Some(toxicity_score),
        contains_negative_word: Some(!hits.is_empty()),
        ..Default::default()
    }
}

/// Map the model's verdict onto a signed score
pub fn remap_sentiment(verdict: &SentimentVerdict) -> (SentimentLabel, f64) {
    match RawSentiment::from_label(&verdict.label) {
        RawSentiment::Negative => (SentimentLabel::Negative, -verdict.score),
        RawSentiment::Neutral => (SentimentLabel::Neutral, 0.0),
        RawSentiment::Positive => (SentimentLabel::Positive, verdict.score),
    }
}

/// Probability of the `toxic` class, 0.0 when the model did not report it
pub fn toxic_probability(distribution: &[LabelScore]) -> f64 {
    distribution
        .iter()
        .find(|entry| entry.label == "toxic")
        .map(|entry| entry.score)
        .unwrap_or(0.0)
}

fn threshold_label(score: f64) -> ToxicityLabel {
    if score > TOXIC_THRESHOLD {
        ToxicityLabel::Toxic
    } else {
        ToxicityLabel::NotToxic
    }
}

/// Boost the toxicity score when the lexicon matched
///
/// The re-derived label uses the lowercase vocabulary and an inclusive
/// threshold, unlike [`threshold_label`].
pub fn apply_lexical_override(
    score: f64,
    label: ToxicityLabel,
    has_negative_word: bool,
) -> (f64, ToxicityLabel) {
    if !has_negative_word || score >= LEXICAL_GATE {
        return (score, label);
    }

    let boosted = (score + LEXICAL_BOOST).min(1.0);
    let label = if boosted >= TOXIC_THRESHOLD {
        ToxicityLabel::LexicalToxic
    } else {
        ToxicityLabel::LexicalNonToxic
    };
    (boosted, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::ClassifierError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier {
        sentiment: &'static str,
        confidence: f64,
        toxic: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(sentiment: &'static str, confidence: f64, toxic: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                sentiment,
                confidence,
                toxic,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut toxicity = vec![LabelScore {
                label: "insult".into(),
                score: 0.9,
            }];
            if let Some(score) = self.toxic {
                toxicity.push(LabelScore {
                    label: "toxic".into(),
                    score,
                });
            }
            Ok(Classification {
                sentiment: SentimentVerdict {
                    label: self.sentiment.into(),
                    score: self.confidence,
                },
                toxicity,
            })
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
            Err(ClassifierError::Backend("model crashed".into()))
        }
    }

    #[test]
    fn test_unloaded_reports_configuration_fault() {
        let record = ScoreSynthesizer::unloaded().analyze("hello");
        assert_eq!(record.error.as_deref(), Some(MODELS_NOT_LOADED));
        assert_eq!(record.sentiment_label, Some(SentimentLabel::Neutral));
        assert_eq!(record.sentiment_score, Some(0.0));
        assert_eq!(record.toxicity_score, Some(0.0));
    }

    #[test]
    fn test_empty_after_normalization_skips_classifier() {
        let classifier = FixedClassifier::new("positive", 0.9, Some(0.9));
        let synth = ScoreSynthesizer::new(classifier.clone());

        for input in ["", "   ", "http://spam-link.com", "!!!"] {
            let record = synth.analyze(input);
            assert_eq!(record.error.as_deref(), Some(EMPTY_MESSAGE));
            assert_eq!(record.cleaned_message.as_deref(), Some(""));
            assert_eq!(record.sentiment_label, Some(SentimentLabel::Neutral));
            assert_eq!(record.sentiment_score, Some(0.0));
            assert_eq!(record.toxicity_label, Some(ToxicityLabel::NotToxic));
            assert_eq!(record.toxicity_score, Some(0.0));
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_negative_sentiment_is_signed() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("LABEL_0", 0.83, Some(0.1)));
        let record = synth.analyze("not great");
        assert_eq!(record.sentiment_label, Some(SentimentLabel::Negative));
        assert_eq!(record.sentiment_score, Some(-0.83));
    }

    #[test]
    fn test_neutral_sentiment_discards_confidence() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("neutral", 0.97, Some(0.1)));
        let record = synth.analyze("just a normal comment");
        assert_eq!(record.sentiment_label, Some(SentimentLabel::Neutral));
        assert_eq!(record.sentiment_score, Some(0.0));
    }

    #[test]
    fn test_positive_sentiment_keeps_confidence() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("positive", 0.91, None));
        let record = synth.analyze("this is awesome");
        assert_eq!(record.sentiment_label, Some(SentimentLabel::Positive));
        assert_eq!(record.sentiment_score, Some(0.91));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_missing_toxic_class_scores_zero() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("positive", 0.9, None));
        let record = synth.analyze("lovely");
        assert_eq!(record.toxicity_score, Some(0.0));
        assert_eq!(record.toxicity_label, Some(ToxicityLabel::NotToxic));
        assert_eq!(record.contains_negative_word, Some(false));
    }

    #[test]
    fn test_model_threshold_is_exclusive() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("neutral", 0.5, Some(0.5)));
        assert_eq!(synth.analyze("hello").toxicity_label, Some(ToxicityLabel::NotToxic));

        let synth = ScoreSynthesizer::new(FixedClassifier::new("neutral", 0.5, Some(0.51)));
        assert_eq!(synth.analyze("hello").toxicity_label, Some(ToxicityLabel::Toxic));
    }

    #[test]
    fn test_scenario_hate_boosts_toxicity() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("negative", 0.95, Some(0.35)));
        let record = synth.analyze("I hate this, it's so bad 😠");

        let cleaned = record.cleaned_message.clone().unwrap();
        assert!(cleaned.contains("hate"));
        assert!(!cleaned.contains('😠'));
        assert_eq!(record.contains_negative_word, Some(true));
        let score = record.toxicity_score.unwrap();
        assert!((score - 0.55).abs() < 1e-9);
        assert_eq!(record.toxicity_label, Some(ToxicityLabel::LexicalToxic));
    }

    #[test]
    fn test_lexical_boost_below_threshold_gives_non_toxic() {
        let synth = ScoreSynthesizer::new(FixedClassifier::new("negative", 0.6, Some(0.1)));
        let record = synth.analyze("that was lame");
        assert!((record.toxicity_score.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(record.toxicity_label, Some(ToxicityLabel::LexicalNonToxic));
    }

    #[test]
    fn test_lexical_boost_is_noop_at_gate() {
        for base in [0.8, 0.85, 0.99, 1.0] {
            let synth = ScoreSynthesizer::new(FixedClassifier::new("negative", 0.9, Some(base)));
            let record = synth.analyze("you stupid idiot");
            assert_eq!(record.toxicity_score, Some(base));
            assert_eq!(record.toxicity_label, Some(ToxicityLabel::Toxic));
            assert_eq!(record.contains_negative_word, Some(true));
        }
    }

    #[test]
    fn test_lexical_boost_clamps_to_one() {
        let (score, label) = apply_lexical_override(0.79, ToxicityLabel::Toxic, true);
        assert!(score <= 1.0);
        assert!((score - 0.99).abs() < 1e-9);
        assert_eq!(label, ToxicityLabel::LexicalToxic);
    }

    #[test]
    fn test_lexical_override_requires_hit() {
        let (score, label) = apply_lexical_override(0.3, ToxicityLabel::NotToxic, false);
        assert_eq!(score, 0.3);
        assert_eq!(label, ToxicityLabel::NotToxic);
    }

    #[test]
    fn test_classifier_failure_becomes_record_error() {
        let synth = ScoreSynthesizer::new(Arc::new(FailingClassifier));
        let record = synth.analyze("Hello World");
        assert_eq!(record.cleaned_message.as_deref(), Some("hello world"));
        assert_eq!(record.error.as_deref(), Some("Classifier failed: model crashed"));
        assert!(record.sentiment_label.is_none());
        assert!(record.sentiment_score.is_none());
        assert!(record.toxicity_label.is_none());
        assert!(record.toxicity_score.is_none());
    }
}
