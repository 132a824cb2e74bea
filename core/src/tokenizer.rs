//! Lexical analysis for the sparse baseline.

use crate::error::{BenchError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// English stop set used when no stopword file is supplied.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it", "no", "not",
    "of", "on", "or", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was",
    "will", "with",
];

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// NFKC normalization, lowercasing, stopword removal and optional stemming.
/// Stopwords are matched before stemming.
#[derive(Debug, Clone)]
pub struct Analyzer {
    stopwords: HashSet<String>,
    stem: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect())
    }
}

impl Analyzer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { stopwords, stem: true }
    }

    pub fn without_stemming(mut self) -> Self {
        self.stem = false;
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        RE.find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|t| !self.is_stopword(t))
            .map(|t| if self.stem { STEMMER.stem(t).into_owned() } else { t.to_string() })
            .collect()
    }
}

/// One stopword per line; blank lines ignored, entries lowercased.
pub fn parse_stopwords(text: &str) -> HashSet<String> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_lowercase).collect()
}

pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let text = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let words = parse_stopwords(&text);
    tracing::info!(path = %path.display(), stopwords = words.len(), "stopword list loaded");
    Ok(words)
}
