//! Internal validator: near-duplicate detection over the idea corpus.
//!
//! The scan is O(n) per idea. Callers that validate a whole corpus may pass
//! a pre-sliced or sampled corpus instead of the full collection.

use chrono::Utc;

use crate::models::{Idea, InternalSource, SimilarIdea};
use crate::similarity::similarity;

/// Scores at or below this are not considered similar.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;
/// Similar ideas kept per scan.
pub const MAX_SIMILAR: usize = 10;
/// Similar ideas reported as competitors.
pub const MAX_REPORTED: usize = 5;

/// A corpus idea that scored above [`SIMILARITY_THRESHOLD`].
#[derive(Debug, Clone)]
pub struct Match<'a> {
    pub idea: &'a Idea,
    pub score: f64,
}

/// Finds the `limit` most similar ideas in `corpus`, best first.
///
/// The idea itself is skipped by identity: a corpus entry's id, or its
/// 1-based position when it has none, is compared with `idea.id`.
pub fn find_similar_ideas<'a>(idea: &Idea, corpus: &'a [Idea], limit: usize) -> Vec<Match<'a>> {
    let mut matches: Vec<Match<'a>> = corpus
        .iter()
        .enumerate()
        .filter(|(index, other)| {
            let other_id = other.id.unwrap_or(*index as u64 + 1);
            idea.id != Some(other_id)
        })
        .filter_map(|(_, other)| {
            let score = similarity(idea, other);
            (score > SIMILARITY_THRESHOLD).then_some(Match { idea: other, score })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);
    matches
}

/// Runs the internal validator for one idea against `corpus`.
pub fn validate_internally(idea: &Idea, corpus: &[Idea]) -> InternalSource {
    let similar = find_similar_ideas(idea, corpus, MAX_SIMILAR);

    let similarity_score = if similar.is_empty() {
        0.0
    } else {
        similar.iter().map(|m| m.score).sum::<f64>() / similar.len() as f64
    };

    InternalSource {
        similar_ideas: similar.len(),
        similarity_score,
        competitors: similar
            .iter()
            .take(MAX_REPORTED)
            .map(|m| SimilarIdea {
                name: m.idea.name.clone(),
                score: m.score,
            })
            .collect(),
        last_checked: Utc::now(),
    }
}

/// Pluggable internal validation, so the aggregator can be exercised with
/// instrumented implementations.
pub trait InternalValidator: Send + Sync {
    fn validate(&self, idea: &Idea, corpus: &[Idea]) -> InternalSource;
}

/// The default [`InternalValidator`]: a full similarity scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusSimilarity;

impl InternalValidator for CorpusSimilarity {
    fn validate(&self, idea: &Idea, corpus: &[Idea]) -> InternalSource {
        validate_internally(idea, corpus)
    }
}
