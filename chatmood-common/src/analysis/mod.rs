//! Message analysis: normalization, lexical signal, classifier seam and score synthesis

pub mod classifier;
pub mod lexicon;
pub mod normalize;
pub mod synth;

pub use classifier::{Classification, Classifier, ClassifierError, LabelScore, RawSentiment, SentimentVerdict};
pub use lexicon::{detect_negative_words, NEGATIVE_WORDS};
pub use normalize::normalize;
pub use synth::ScoreSynthesizer;
