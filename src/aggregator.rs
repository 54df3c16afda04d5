//! Validation aggregator.
//!
//! Runs the internal corpus scan and the external search side by side and
//! folds whatever came back into one [`ValidationOutcome`]. Each source is
//! isolated in its own task: a panic on either side drops that source from
//! the result and is logged, the other source is unaffected.

use ideavoid_core::internal::{CorpusSimilarity, InternalValidator};
use ideavoid_core::models::{Idea, SourceResult, ValidationOutcome, ValidationResult};
use ideavoid_core::saturation;
use ideavoid_core::scoring::{aggregate_score, determine_status};
use ideavoid_core::search::SearchValidator;
use std::sync::Arc;

/// Per-call options. Passed down explicitly so concurrent calls never
/// share a refresh flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    pub bypass_search_cache: bool,
}

impl ValidationContext {
    pub fn fresh() -> Self {
        Self {
            bypass_search_cache: true,
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    internal_enabled: bool,
    internal: Arc<dyn InternalValidator>,
    search: Arc<dyn SearchValidator>,
}

impl Aggregator {
    pub fn new(
        internal_enabled: bool,
        internal: Arc<dyn InternalValidator>,
        search: Arc<dyn SearchValidator>,
    ) -> Self {
        Self {
            internal_enabled,
            internal,
            search,
        }
    }

    /// The default internal validator with the given search validator.
    pub fn with_search(internal_enabled: bool, search: Arc<dyn SearchValidator>) -> Self {
        Self::new(internal_enabled, Arc::new(CorpusSimilarity), search)
    }

    pub fn search(&self) -> &Arc<dyn SearchValidator> {
        &self.search
    }

    pub fn internal_enabled(&self) -> bool {
        self.internal_enabled
    }

    pub async fn aggregate(
        &self,
        idea: &Idea,
        corpus: Arc<[Idea]>,
        ctx: ValidationContext,
    ) -> ValidationOutcome {
        let internal = async {
            if !self.internal_enabled {
                return None;
            }
            let validator = Arc::clone(&self.internal);
            let idea = idea.clone();
            match tokio::task::spawn_blocking(move || validator.validate(&idea, &corpus)).await {
                Ok(result) => Some(SourceResult::InternalDatabase(result)),
                Err(e) => {
                    tracing::error!(error = %e, "internal validation failed");
                    None
                }
            }
        };

        let external = async {
            if !self.search.is_enabled() {
                return None;
            }
            let search = Arc::clone(&self.search);
            let idea = idea.clone();
            let bypass = ctx.bypass_search_cache;
            match tokio::spawn(async move { search.validate_with_search(&idea, bypass).await })
                .await
            {
                Ok(result) if result.enabled => Some(SourceResult::ExternalSearch(result)),
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "external search validation failed");
                    None
                }
            }
        };

        let (internal, external) = tokio::join!(internal, external);
        let sources: Vec<SourceResult> = internal.into_iter().chain(external).collect();

        let aggregated_score = aggregate_score(&sources);
        let status = determine_status(&aggregated_score);
        let saturation = saturation::from_aggregated_score(&aggregated_score);

        tracing::debug!(
            idea = %idea.name,
            sources = sources.len(),
            competitors = aggregated_score.total_competitors,
            status = status.as_str(),
            "aggregated validation"
        );

        ValidationOutcome {
            validation: ValidationResult {
                sources,
                aggregated_score,
                status,
            },
            saturation,
        }
    }
}
