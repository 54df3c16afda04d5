//! Similarity engine: a bounded `[0, 1]` score between two ideas.
//!
//! # Scoring
//!
//! | Term | Weight | Metric |
//! |------|--------|--------|
//! | name | 0.4 | bigram Dice coefficient over lower-cased names |
//! | description | 0.3 | bigram Dice coefficient over lower-cased descriptions |
//! | tags | 0.2 | Jaccard index of lower-cased tag sets |
//! | keywords | 0.1 | Jaccard index of extracted keywords |
//!
//! A term only fires when both ideas have input for it, and the final
//! score is renormalized by the weights that fired, so an idea with no
//! description is not penalized for the gap.

use std::collections::{HashMap, HashSet};

use crate::models::Idea;

pub const NAME_WEIGHT: f64 = 0.4;
pub const DESCRIPTION_WEIGHT: f64 = 0.3;
pub const TAG_WEIGHT: f64 = 0.2;
pub const KEYWORD_WEIGHT: f64 = 0.1;

/// Keywords kept per text after stop-word filtering.
pub const MAX_KEYWORDS: usize = 20;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who", "whom",
    "whose", "where", "when", "why", "how", "all", "each", "every", "both", "few", "more", "most",
    "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very",
];

/// Dice coefficient over character bigrams, ignoring whitespace.
///
/// Identical strings score 1; strings shorter than two characters
/// (after whitespace removal) otherwise score 0.
pub fn dice_coefficient(first: &str, second: &str) -> f64 {
    let a: Vec<char> = first.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = second.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for w in a.windows(2) {
        *bigrams.entry((w[0], w[1])).or_insert(0) += 1;
    }

    let mut intersection = 0usize;
    for w in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(w[0], w[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / ((a.len() + b.len() - 2) as f64)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Jaccard index of two tag lists, compared case-insensitively.
///
/// Returns 0 when either list is empty.
pub fn tag_overlap(tags1: &[String], tags2: &[String]) -> f64 {
    let a: HashSet<String> = tags1.iter().map(|t| t.to_lowercase()).collect();
    let b: HashSet<String> = tags2.iter().map(|t| t.to_lowercase()).collect();
    jaccard(&a, &b)
}

/// Extracts up to [`MAX_KEYWORDS`] keywords from `text`, in order of
/// appearance: word tokens of at least three characters that are not stop
/// words, lower-cased.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|tok| tok.chars().count() >= 3)
        .map(|tok| tok.to_lowercase())
        .filter(|tok| !STOP_WORDS.contains(&tok.as_str()))
        .take(MAX_KEYWORDS)
        .collect()
}

fn keyword_text(idea: &Idea) -> String {
    format!("{} {}", idea.name, idea.description).to_lowercase()
}

/// Jaccard index of the keyword sets of two ideas (name + description).
pub fn keyword_overlap(a: &Idea, b: &Idea) -> f64 {
    let k1: HashSet<String> = extract_keywords(&keyword_text(a)).into_iter().collect();
    let k2: HashSet<String> = extract_keywords(&keyword_text(b)).into_iter().collect();
    jaccard(&k1, &k2)
}

/// Weighted, renormalized similarity of two ideas in `[0, 1]`.
pub fn similarity(a: &Idea, b: &Idea) -> f64 {
    let mut score = 0.0;
    let mut weight = 0.0;

    let (name_a, name_b) = (a.name.trim(), b.name.trim());
    if !name_a.is_empty() && !name_b.is_empty() {
        score += dice_coefficient(&name_a.to_lowercase(), &name_b.to_lowercase()) * NAME_WEIGHT;
        weight += NAME_WEIGHT;
    }

    let (desc_a, desc_b) = (a.description.trim(), b.description.trim());
    if !desc_a.is_empty() && !desc_b.is_empty() {
        score += dice_coefficient(&desc_a.to_lowercase(), &desc_b.to_lowercase())
            * DESCRIPTION_WEIGHT;
        weight += DESCRIPTION_WEIGHT;
    }

    if !a.tags.is_empty() && !b.tags.is_empty() {
        score += tag_overlap(&a.tags, &b.tags) * TAG_WEIGHT;
        weight += TAG_WEIGHT;
    }

    let k1: HashSet<String> = extract_keywords(&keyword_text(a)).into_iter().collect();
    let k2: HashSet<String> = extract_keywords(&keyword_text(b)).into_iter().collect();
    if !k1.is_empty() && !k2.is_empty() {
        score += jaccard(&k1, &k2) * KEYWORD_WEIGHT;
        weight += KEYWORD_WEIGHT;
    }

    if weight > 0.0 {
        (score / weight).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
