//! Core data models used throughout IdeaAvoid.
//!
//! These types mirror the JSON document the catalog is stored in
//! (`camelCase` field names) and the validation payloads returned by the
//! HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single business idea record.
///
/// Fields the application does not model are kept in [`extra`](Idea::extra)
/// so that rewriting the catalog document does not drop them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<Saturation>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Idea {
    /// Builds an unpersisted idea, as submitted for ad-hoc validation.
    pub fn new(name: impl Into<String>, description: impl Into<String>, tags: Vec<String>) -> Self {
        let mut idea = Self {
            name: name.into(),
            description: description.into(),
            tags,
            ..Self::default()
        };
        idea.dedup_tags();
        idea
    }

    /// Brings a freshly deserialized record into canonical shape.
    ///
    /// Older documents use `title` instead of `name`; tags are made unique
    /// case-insensitively (first spelling wins).
    pub fn normalize(&mut self) {
        if self.name.trim().is_empty() {
            if let Some(title) = self.extra.get("title").and_then(|v| v.as_str()) {
                self.name = title.to_string();
            }
        }
        self.dedup_tags();
    }

    fn dedup_tags(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|t| {
            let t = t.trim();
            !t.is_empty() && seen.insert(t.to_lowercase())
        });
    }

    /// True once the idea carries both halves of a validation verdict.
    pub fn is_validated(&self) -> bool {
        self.validation.is_some() && self.saturation.is_some()
    }

    /// Stores a validation verdict, always replacing both fields together.
    pub fn apply_outcome(&mut self, outcome: ValidationOutcome) {
        self.validation = Some(outcome.validation);
        self.saturation = Some(outcome.saturation);
    }
}

/// A similar idea reported by the internal validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarIdea {
    pub name: String,
    pub score: f64,
}

/// A competitor found by the external search validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCompetitor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Result of scanning the idea corpus for near-duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalSource {
    pub similar_ideas: usize,
    pub similarity_score: f64,
    #[serde(default)]
    pub competitors: Vec<SimilarIdea>,
    pub last_checked: DateTime<Utc>,
}

/// Result of a web search for competing products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSource {
    pub competitor_count: usize,
    pub total_results: usize,
    #[serde(default)]
    pub competitors: Vec<SearchCompetitor>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_checked: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl ExternalSource {
    /// The placeholder returned when external search is switched off.
    pub fn disabled(now: DateTime<Utc>) -> Self {
        Self {
            competitor_count: 0,
            total_results: 0,
            competitors: Vec::new(),
            enabled: false,
            error: None,
            last_checked: now,
        }
    }

    /// A zero-count result carrying the failure message.
    pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            competitor_count: 0,
            total_results: 0,
            competitors: Vec::new(),
            enabled: true,
            error: Some(message.into()),
            last_checked: now,
        }
    }
}

/// One validation source's output, tagged by `source` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceResult {
    InternalDatabase(InternalSource),
    #[serde(alias = "google")]
    ExternalSearch(ExternalSource),
}

impl SourceResult {
    /// The competitor count this source reports on its own.
    pub fn competitor_count(&self) -> usize {
        match self {
            SourceResult::InternalDatabase(s) => s.similar_ideas,
            SourceResult::ExternalSearch(s) => s.competitor_count,
        }
    }

    /// Whether this source counts towards aggregation.
    pub fn contributes(&self) -> bool {
        match self {
            SourceResult::InternalDatabase(_) => true,
            SourceResult::ExternalSearch(s) => s.enabled,
        }
    }

    pub fn last_checked(&self) -> DateTime<Utc> {
        match self {
            SourceResult::InternalDatabase(s) => s.last_checked,
            SourceResult::ExternalSearch(s) => s.last_checked,
        }
    }
}

/// Combined score over every contributing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedScore {
    pub total_competitors: usize,
    #[serde(default)]
    pub avg_similarity: f64,
    pub confidence: f64,
    pub sources_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Verified,
    Pending,
    Unverified,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Verified => "verified",
            ValidationStatus::Pending => "pending",
            ValidationStatus::Unverified => "unverified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub sources: Vec<SourceResult>,
    pub aggregated_score: AggregatedScore,
    pub status: ValidationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturationLevel {
    Low,
    Medium,
    High,
}

impl SaturationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaturationLevel::Low => "low",
            SaturationLevel::Medium => "medium",
            SaturationLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketType {
    #[serde(rename = "blue ocean")]
    BlueOcean,
    #[serde(rename = "red ocean")]
    RedOcean,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::BlueOcean => "blue ocean",
            MarketType::RedOcean => "red ocean",
        }
    }
}

/// Heuristic crowding verdict derived from a competitor count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Saturation {
    pub level: SaturationLevel,
    pub competitor_count: usize,
    pub market_type: MarketType,
    pub tam: String,
    pub last_verified: DateTime<Utc>,
}

/// The validation/saturation pair produced by one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub validation: ValidationResult,
    pub saturation: Saturation,
}
