//! # chatmood Common Library
//!
//! Shared code for the chatmood processes:
//! - Data model (AnalysisRecord, sentiment/toxicity labels)
//! - Text normalization and negative-word lexicon
//! - Classifier interface and score synthesis
//! - Stream URL parsing
//! - Configuration loading

pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod pointer;
pub mod time;
pub mod video;

pub use error::{Error, Result};
pub use model::{AnalysisRecord, ChatMessage, SentimentLabel, ToxicityLabel};
