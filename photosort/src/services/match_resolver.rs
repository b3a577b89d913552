//! Tiered label resolution
//!
//! Resolves a filename against the reference index through three tiers of
//! decreasing strictness and increasing cost:
//!
//! 1. EXACT - per token, O(1) map probe
//! 2. FUZZY - per token, normalized edit similarity against every identifier
//! 3. SIMILARITY - one pass over the whole token set in the TF-IDF space
//!
//! The first tier to produce a hit wins; later tiers are never consulted
//! after a success. Exact must dominate fuzzy, and fuzzy must dominate
//! similarity, because each later tier accepts strictly more inputs.

use crate::services::reference_index::ReferenceIndex;
use crate::services::tokenizer::tokenize;

/// Default cutoff for the fuzzy tier
pub const DEFAULT_FUZZY_CUTOFF: f64 = 0.6;
/// Default threshold for the similarity tier
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Fuzzy,
    Similarity,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "exact"),
            MatchTier::Fuzzy => write!(f, "fuzzy"),
            MatchTier::Similarity => write!(f, "similarity"),
        }
    }
}

/// Resolution outcome for one filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A tier produced a label
    Matched { label: String, tier: MatchTier },
    /// No tier succeeded
    Unmatched,
}

/// Tiered match resolver
///
/// Holds the tier thresholds; the index is passed per call so one resolver
/// serves any number of runs.
#[derive(Debug, Clone, Copy)]
pub struct MatchResolver {
    fuzzy_cutoff: f64,
    similarity_threshold: f64,
}

impl MatchResolver {
    pub fn new(fuzzy_cutoff: f64, similarity_threshold: f64) -> Self {
        Self {
            fuzzy_cutoff,
            similarity_threshold,
        }
    }

    /// Resolve a base name against the index
    ///
    /// **Algorithm:**
    /// 1. Tokenize the base name
    /// 2. EXACT: lowercase each token in order, probe the map, first hit wins
    /// 3. FUZZY: each token in the same order against every identifier
    /// 4. SIMILARITY: single pass over the whole token set
    /// 5. Nothing fired: `Unmatched`
    pub fn resolve(&self, base_name: &str, index: &ReferenceIndex) -> MatchResult {
        let tokens = tokenize(base_name);

        for token in &tokens {
            if let Some(label) = index.lookup_exact(&token.to_lowercase()) {
                tracing::debug!(base_name = %base_name, token = %token, label = %label, "Exact match");
                return MatchResult::Matched {
                    label: label.to_string(),
                    tier: MatchTier::Exact,
                };
            }
        }

        for token in &tokens {
            if let Some(label) = index.lookup_fuzzy(&token.to_lowercase(), self.fuzzy_cutoff) {
                tracing::info!(base_name = %base_name, token = %token, label = %label, "Fuzzy match");
                return MatchResult::Matched {
                    label: label.to_string(),
                    tier: MatchTier::Fuzzy,
                };
            }
        }

        if let Some(hit) = index.lookup_similarity(&tokens, self.similarity_threshold) {
            tracing::info!(
                base_name = %base_name,
                token = %tokens[hit.token_index],
                label = %hit.label,
                score = hit.score,
                "Similarity match"
            );
            return MatchResult::Matched {
                label: hit.label,
                tier: MatchTier::Similarity,
            };
        }

        tracing::debug!(base_name = %base_name, "No match in any tier");
        MatchResult::Unmatched
    }
}

impl Default for MatchResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_CUTOFF, DEFAULT_SIMILARITY_THRESHOLD)
    }
}
