//! Aggregation rules: combining source results into one score and status.

use crate::models::{AggregatedScore, SourceResult, ValidationStatus};

/// Confidence contributed by the internal corpus scan.
pub const INTERNAL_CONFIDENCE: f64 = 0.3;
/// Confidence contributed by an enabled external search.
pub const EXTERNAL_CONFIDENCE: f64 = 0.7;
/// Confidence above which a non-zero competitor count is `verified`.
pub const VERIFIED_CONFIDENCE: f64 = 0.5;

pub fn confidence_weight(source: &SourceResult) -> f64 {
    match source {
        SourceResult::InternalDatabase(_) => INTERNAL_CONFIDENCE,
        SourceResult::ExternalSearch(_) => EXTERNAL_CONFIDENCE,
    }
}

/// Sums competitor counts and confidence weights over contributing sources.
///
/// `total_competitors` is the **sum** of each source's own count;
/// `confidence` is capped at 1; `avg_similarity` averages the non-zero
/// internal similarity scores.
pub fn aggregate_score(sources: &[SourceResult]) -> AggregatedScore {
    let mut total_competitors = 0usize;
    let mut confidence = 0.0f64;
    let mut similarity_sum = 0.0f64;
    let mut similarity_count = 0usize;

    for source in sources.iter().filter(|s| s.contributes()) {
        total_competitors += source.competitor_count();
        confidence += confidence_weight(source);
        if let SourceResult::InternalDatabase(internal) = source {
            if internal.similarity_score > 0.0 {
                similarity_sum += internal.similarity_score;
                similarity_count += 1;
            }
        }
    }

    AggregatedScore {
        total_competitors,
        avg_similarity: if similarity_count > 0 {
            similarity_sum / similarity_count as f64
        } else {
            0.0
        },
        confidence: confidence.min(1.0),
        sources_count: sources.len(),
    }
}

pub fn determine_status(score: &AggregatedScore) -> ValidationStatus {
    if score.total_competitors == 0 {
        ValidationStatus::Unverified
    } else if score.confidence > VERIFIED_CONFIDENCE {
        ValidationStatus::Verified
    } else {
        ValidationStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalSource, InternalSource};
    use chrono::Utc;

    fn internal(similar: usize, score: f64) -> SourceResult {
        SourceResult::InternalDatabase(InternalSource {
            similar_ideas: similar,
            similarity_score: score,
            competitors: vec![],
            last_checked: Utc::now(),
        })
    }

    fn external(count: usize, enabled: bool) -> SourceResult {
        SourceResult::ExternalSearch(ExternalSource {
            competitor_count: count,
            total_results: count,
            competitors: vec![],
            enabled,
            error: None,
            last_checked: Utc::now(),
        })
    }

    fn score(total: usize, confidence: f64) -> AggregatedScore {
        AggregatedScore {
            total_competitors: total,
            avg_similarity: 0.0,
            confidence,
            sources_count: 1,
        }
    }

    #[test]
    fn test_both_sources_confidence_is_exactly_one() {
        let agg = aggregate_score(&[internal(3, 0.5), external(4, true)]);
        assert_eq!(agg.confidence, 1.0);
        assert_eq!(agg.total_competitors, 7);
        assert_eq!(agg.sources_count, 2);
        assert!((agg.avg_similarity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_internal_only_confidence() {
        let agg = aggregate_score(&[internal(2, 0.4)]);
        assert!((agg.confidence - INTERNAL_CONFIDENCE).abs() < 1e-9);
        assert_eq!(determine_status(&agg), ValidationStatus::Pending);
    }

    #[test]
    fn test_disabled_external_contributes_nothing() {
        let agg = aggregate_score(&[external(9, false)]);
        assert_eq!(agg.confidence, 0.0);
        assert_eq!(agg.total_competitors, 0);
    }

    #[test]
    fn test_no_sources() {
        let agg = aggregate_score(&[]);
        assert_eq!(agg.total_competitors, 0);
        assert_eq!(agg.confidence, 0.0);
        assert_eq!(agg.sources_count, 0);
        assert_eq!(determine_status(&agg), ValidationStatus::Unverified);
    }

    #[test]
    fn test_status_rules() {
        assert_eq!(determine_status(&score(0, 1.0)), ValidationStatus::Unverified);
        assert_eq!(determine_status(&score(5, 0.6)), ValidationStatus::Verified);
        assert_eq!(determine_status(&score(5, 0.4)), ValidationStatus::Pending);
        assert_eq!(determine_status(&score(5, 0.5)), ValidationStatus::Pending);
    }
}
