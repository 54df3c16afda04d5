//! Saturation calculator: competitor count → level, market type, TAM bucket.
//!
//! Two entry points reduce their input to a single competitor count
//! differently:
//!
//! - [`from_aggregated_score`] uses `total_competitors`, which the
//!   aggregator computes as the **sum** across sources.
//! - [`from_source_list`] takes the **maximum** single-source count, falling
//!   back to the sum only when every source reported zero. This path is used
//!   by enrichment runs that have no aggregated score yet.

use chrono::{DateTime, Utc};

use crate::models::{AggregatedScore, MarketType, Saturation, SaturationLevel, SourceResult};

pub fn level_for(count: usize) -> SaturationLevel {
    if count >= 50 {
        SaturationLevel::High
    } else if count >= 10 {
        SaturationLevel::Medium
    } else {
        SaturationLevel::Low
    }
}

pub fn market_type_for(count: usize) -> MarketType {
    if count >= 20 {
        MarketType::RedOcean
    } else {
        MarketType::BlueOcean
    }
}

pub fn tam_for(count: usize) -> &'static str {
    match count {
        c if c >= 100 => "$1B+",
        c if c >= 50 => "$500M+",
        c if c >= 20 => "$100M+",
        c if c >= 10 => "$50M+",
        c if c > 0 => "$10M+",
        _ => "Unknown",
    }
}

/// Builds a [`Saturation`] for an already-reduced competitor count.
pub fn from_competitor_count(count: usize, now: DateTime<Utc>) -> Saturation {
    Saturation {
        level: level_for(count),
        competitor_count: count,
        market_type: market_type_for(count),
        tam: tam_for(count).to_string(),
        last_verified: now,
    }
}

pub fn from_aggregated_score(score: &AggregatedScore) -> Saturation {
    from_competitor_count(score.total_competitors, Utc::now())
}

pub fn from_source_list(sources: &[SourceResult]) -> Saturation {
    from_competitor_count(reduce_sources(sources), Utc::now())
}

/// Max-of-sources reduction used by [`from_source_list`].
pub fn reduce_sources(sources: &[SourceResult]) -> usize {
    let max = sources
        .iter()
        .map(SourceResult::competitor_count)
        .max()
        .unwrap_or(0);
    if max > 0 {
        max
    } else {
        sources.iter().map(SourceResult::competitor_count).sum()
    }
}
