//! Reference table index
//!
//! Builds the identifier → label mapping from the loaded reference table and
//! freezes a character-level TF-IDF space over the identifiers for the
//! similarity tier. Immutable after `build`; lookups take `&self` only, so
//! concurrent readers need no locking.
//!
//! Identifier order is the insertion order of the input rows and defines the
//! tie-break for the fuzzy and similarity tiers. A duplicate identifier
//! keeps its original position but takes the later row's label.

use photosort_common::{Error, Result};
use std::collections::HashMap;

/// One row of the reference table, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Key matched against filename tokens
    pub identifier: String,
    /// Name the matched file is renamed to
    pub label: String,
}

impl ReferenceEntry {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
        }
    }
}

/// Best hit from the similarity tier
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    /// Index of the winning token in the probed token sequence
    pub token_index: usize,
    /// Label of the winning identifier
    pub label: String,
    /// Cosine similarity score (0.0 - 1.0)
    pub score: f64,
}

/// Immutable identifier → label index with a frozen similarity space
pub struct ReferenceIndex {
    /// Identifiers in insertion order (tie-break order)
    identifiers: Vec<String>,
    /// Labels aligned with `identifiers`
    labels: Vec<String>,
    /// identifier → position in `identifiers`
    by_identifier: HashMap<String, usize>,
    /// Frozen character TF-IDF space over all identifiers
    vectorizer: CharVectorizer,
    /// Pre-projected identifier vectors, aligned with `identifiers`
    identifier_vectors: Vec<Vec<f64>>,
}

impl ReferenceIndex {
    /// Build the index from reference table rows
    ///
    /// Identifiers are trimmed and lowercased; rows whose identifier is
    /// empty after normalization are dropped. Fails if nothing survives
    /// normalization.
    pub fn build(entries: impl IntoIterator<Item = ReferenceEntry>) -> Result<Self> {
        let mut identifiers: Vec<String> = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        let mut by_identifier: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let identifier = entry.identifier.trim().to_lowercase();
            if identifier.is_empty() {
                continue;
            }
            let label = entry.label.trim().to_string();

            match by_identifier.get(&identifier) {
                Some(&pos) => {
                    // Later row wins, position is kept
                    labels[pos] = label;
                }
                None => {
                    by_identifier.insert(identifier.clone(), identifiers.len());
                    identifiers.push(identifier);
                    labels.push(label);
                }
            }
        }

        if identifiers.is_empty() {
            return Err(Error::ReferenceLoad(
                "reference table contains no usable identifiers".to_string(),
            ));
        }

        let vectorizer = CharVectorizer::fit(&identifiers);
        let identifier_vectors = identifiers
            .iter()
            .map(|id| vectorizer.project(id))
            .collect();

        tracing::info!(
            identifiers = identifiers.len(),
            "Reference index built"
        );

        Ok(Self {
            identifiers,
            labels,
            by_identifier,
            vectorizer,
            identifier_vectors,
        })
    }

    /// Number of distinct identifiers
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Exact lookup; `key` must already be lowercased by the caller
    pub fn lookup_exact(&self, key: &str) -> Option<&str> {
        self.by_identifier
            .get(key)
            .map(|&pos| self.labels[pos].as_str())
    }

    /// Fuzzy lookup by normalized edit similarity
    ///
    /// Scores `key` against every identifier and returns the label of the
    /// best one when its ratio reaches `cutoff`. Ties go to the identifier
    /// inserted first.
    pub fn lookup_fuzzy(&self, key: &str, cutoff: f64) -> Option<&str> {
        let mut best: Option<(usize, f64)> = None;

        for (pos, identifier) in self.identifiers.iter().enumerate() {
            let ratio = strsim::normalized_levenshtein(key, identifier);
            if best.map_or(true, |(_, b)| ratio > b) {
                best = Some((pos, ratio));
            }
        }

        match best {
            Some((pos, ratio)) if ratio >= cutoff => {
                tracing::debug!(
                    key = %key,
                    identifier = %self.identifiers[pos],
                    ratio,
                    "Fuzzy match"
                );
                Some(self.labels[pos].as_str())
            }
            _ => None,
        }
    }

    /// Similarity lookup over the whole token set
    ///
    /// Projects every token and every identifier into the frozen character
    /// TF-IDF space and selects the single best cosine pair. Ties go to the
    /// smallest token index, then the identifier inserted first.
    pub fn lookup_similarity(&self, tokens: &[String], threshold: f64) -> Option<SimilarityHit> {
        let mut best: Option<(usize, usize, f64)> = None;

        for (token_idx, token) in tokens.iter().enumerate() {
            let token_vec = self.vectorizer.project(&token.to_lowercase());
            for (ref_idx, ref_vec) in self.identifier_vectors.iter().enumerate() {
                let score = dot(&token_vec, ref_vec);
                if best.map_or(true, |(_, _, b)| score > b) {
                    best = Some((token_idx, ref_idx, score));
                }
            }
        }

        match best {
            Some((token_idx, ref_idx, score)) if score >= threshold => {
                tracing::debug!(
                    token = %tokens[token_idx],
                    identifier = %self.identifiers[ref_idx],
                    score,
                    "Similarity match"
                );
                Some(SimilarityHit {
                    token_index: token_idx,
                    label: self.labels[ref_idx].clone(),
                    score,
                })
            }
            _ => None,
        }
    }
}

/// Character-level TF-IDF space, frozen at build time
///
/// Term frequency is the raw character count, idf is the smoothed
/// `ln((1 + n) / (1 + df)) + 1`, and tf·idf vectors are L2-normalized so
/// cosine similarity reduces to a dot product. Characters outside the
/// fitted vocabulary are ignored when projecting.
struct CharVectorizer {
    vocab: HashMap<char, usize>,
    idf: Vec<f64>,
}

impl CharVectorizer {
    fn fit(documents: &[String]) -> Self {
        let mut vocab: HashMap<char, usize> = HashMap::new();
        let mut ordered: Vec<char> = Vec::new();
        for doc in documents {
            for c in doc.chars() {
                if !vocab.contains_key(&c) {
                    vocab.insert(c, ordered.len());
                    ordered.push(c);
                }
            }
        }

        let n = documents.len() as f64;
        let mut df = vec![0usize; ordered.len()];
        for doc in documents {
            let mut seen = vec![false; ordered.len()];
            for c in doc.chars() {
                let idx = vocab[&c];
                if !seen[idx] {
                    seen[idx] = true;
                    df[idx] += 1;
                }
            }
        }

        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        Self { vocab, idf }
    }

    /// Project text into the space as an L2-normalized tf·idf vector
    ///
    /// Text sharing no characters with the vocabulary projects to the zero
    /// vector, which scores 0.0 against everything.
    fn project(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0f64; self.idf.len()];
        for c in text.chars() {
            if let Some(&idx) = self.vocab.get(&c) {
                vector[idx] += 1.0;
            }
        }

        for (idx, value) in vector.iter_mut().enumerate() {
            *value *= self.idf[idx];
        }

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }
        vector
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
