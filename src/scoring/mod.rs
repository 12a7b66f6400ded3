//! Semantic relevance of block bodies against a keyword "topic vector".

pub mod bert;

use std::cell::OnceCell;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::parser::{extract_fields_with, Block, FunctionFields, PatternSet};

pub use bert::BertEmbedder;

/// Driver-assistance vocabulary, embedded as one space-joined string.
pub const ADAS_KEYWORDS: &[&str] = &[
    "ADAS",
    "autonomous",
    "lane",
    "radar",
    "camera",
    "detection",
    "warning",
    "blind spot",
    "collision",
    "ACC",
    "AEB",
    "traffic sign",
    "control unit",
    "lighting",
    "indicator",
];

pub const DEFAULT_THRESHOLD: f64 = 0.45;

/// Maximum number of characters of a body carried into the output table.
pub const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("model file `{file}` not available from {source_name}: {message}")]
    MissingFile {
        file: &'static str,
        source_name: String,
        message: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Hugging Face Hub unavailable: {0}")]
    Hub(String),
    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

/// Turns text into a fixed-length vector. Implementations must be deterministic.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text)
    }
}

/// Cosine similarity in [-1, 1]; zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    const EPS: f32 = 1e-8;
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt()).max(EPS)
}

/// Relevance of `text` to `vocabulary`, not clamped to [0, 1].
pub fn score(
    embedder: &impl Embedder,
    text: &str,
    vocabulary: &[&str],
) -> Result<f32, EmbedError> {
    let topic = embedder.embed(&vocabulary.join(" "))?;
    let body = embedder.embed(text)?;
    Ok(cosine_similarity(&body, &topic))
}

/// A block that passed the threshold, with its extracted metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub block: Block,
    pub relevance_score: f32,
    pub fields: FunctionFields,
    pub content: String,
}

/// One output row; field order is the column order of every output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    #[serde(rename = "Function Title")]
    pub title: String,
    #[serde(rename = "Function ID")]
    pub function_id: String,
    #[serde(rename = "Semantic ADAS Score")]
    pub score: f64,
    #[serde(rename = "Function Code")]
    pub function_code: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Owner Team")]
    pub owner_team: String,
    #[serde(rename = "Extracted Content")]
    pub content: String,
}

pub const COLUMNS: [&str; 7] = [
    "Function Title",
    "Function ID",
    "Semantic ADAS Score",
    "Function Code",
    "Domain",
    "Owner Team",
    "Extracted Content",
];

impl ScoredRecord {
    pub fn to_row(&self) -> OutputRow {
        OutputRow {
            title: self.block.title.clone(),
            function_id: self.block.function_id.clone(),
            score: round3(self.relevance_score),
            function_code: self.fields.function_code.clone(),
            domain: self.fields.domain.clone(),
            owner_team: self.fields.owner_team.clone(),
            content: self.content.clone(),
        }
    }
}

fn round3(score: f32) -> f64 {
    (f64::from(score) * 1000.0).round() / 1000.0
}

/// Hard cut at `max` characters, not word-aware.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Scores block bodies against a fixed vocabulary with a shared embedder.
///
/// The pattern set decides both where blocks start and how their fields are read.
pub struct Scorer<E> {
    embedder: E,
    vocabulary: Vec<String>,
    patterns: PatternSet,
    topic: OnceCell<Vec<f32>>,
}

impl<E: Embedder> Scorer<E> {
    pub fn new(embedder: E, vocabulary: &[&str]) -> Self {
        Self {
            embedder,
            vocabulary: vocabulary.iter().map(|k| k.to_string()).collect(),
            patterns: PatternSet::customer_function().clone(),
            topic: OnceCell::new(),
        }
    }

    pub fn adas(embedder: E) -> Self {
        Self::new(embedder, ADAS_KEYWORDS)
    }

    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    fn topic(&self) -> Result<&[f32], EmbedError> {
        if let Some(topic) = self.topic.get() {
            return Ok(topic.as_slice());
        }
        let topic = self.embedder.embed(&self.vocabulary.join(" "))?;
        Ok(self.topic.get_or_init(|| topic).as_slice())
    }

    pub fn score(&self, text: &str) -> Result<f32, EmbedError> {
        let topic = self.topic()?;
        let body = self.embedder.embed(text)?;
        Ok(cosine_similarity(&body, topic))
    }

    /// Keep `block` iff its score is at least `threshold`.
    pub fn classify(&self, block: &Block, threshold: f64) -> Result<Option<ScoredRecord>, EmbedError> {
        let relevance_score = self.score(&block.body)?;
        tracing::debug!(
            id = %block.function_id,
            score = relevance_score,
            "scored block"
        );
        Ok(retain(block, relevance_score, threshold, &self.patterns))
    }
}

/// Threshold decision and projection for an already-computed score.
pub fn retain(
    block: &Block,
    relevance_score: f32,
    threshold: f64,
    patterns: &PatternSet,
) -> Option<ScoredRecord> {
    if f64::from(relevance_score) < threshold {
        return None;
    }
    Some(ScoredRecord {
        fields: extract_fields_with(&block.body, patterns),
        content: truncate_chars(&block.body, MAX_CONTENT_CHARS),
        block: block.clone(),
        relevance_score,
    })
}
