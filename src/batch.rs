//! Whole-catalog batch commands: `validate-all` and `enrich`.
//!
//! Both commands take exclusive ownership of the ideas file for the run.
//! Ideas are processed in batches of `batch.batch_size`; `validate-all`
//! pauses `batch.delay_ms` between batches and rewrites the document after
//! each one, so an interrupted run loses at most one batch.
//!
//! Sample mode processes the first `batch.sample_size` ideas and writes
//! nothing.

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use ideavoid_core::internal::validate_internally;
use ideavoid_core::models::{
    AggregatedScore, Idea, SourceResult, ValidationOutcome, ValidationResult, ValidationStatus,
};
use ideavoid_core::saturation;
use ideavoid_core::scoring::INTERNAL_CONFIDENCE;
use ideavoid_core::search::SearchValidator;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::progress::{BatchProgress, BatchProgressReporter};
use crate::repository::{load_document, save_document, IdeaDocument, IdeaRepository};
use crate::service::ValidationService;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateAllOptions {
    pub sample: bool,
    pub skip_existing: bool,
    /// Run without the external search source.
    pub internal_only: bool,
}

/// Counters recorded in `metadata.validation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAllStats {
    pub total_ideas: usize,
    pub validated_ideas: usize,
    pub skipped_ideas: usize,
    /// Ideas whose external search failed. They are still validated from
    /// the sources that did answer.
    pub errors: usize,
    pub sample_mode: bool,
}

/// Counters recorded in `metadata.enrichment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStats {
    pub total_ideas: usize,
    pub enriched_ideas: usize,
    pub sample_mode: bool,
}

fn selection_len(doc: &IdeaDocument, config: &Config, sample: bool) -> usize {
    if sample {
        doc.ideas.len().min(config.batch.sample_size)
    } else {
        doc.ideas.len()
    }
}

fn search_failed(outcome: &ValidationOutcome) -> bool {
    outcome
        .validation
        .sources
        .iter()
        .any(|s| matches!(s, SourceResult::ExternalSearch(e) if e.error.is_some()))
}

fn record_validation(doc: &mut IdeaDocument, stats: &ValidateAllStats, completed: bool) {
    let mut value = serde_json::json!({
        "processed": Utc::now().to_rfc3339(),
        "totalIdeas": stats.total_ideas,
        "validatedIdeas": stats.validated_ideas,
        "skippedIdeas": stats.skipped_ideas,
        "errors": stats.errors,
        "sampleMode": stats.sample_mode,
        "inProgress": !completed,
    });
    if completed {
        value["completed"] = serde_json::Value::Bool(true);
    }
    doc.metadata.insert("validation".to_string(), value);
}

/// Validates every idea through the validation service and stores the
/// outcome on the idea.
pub async fn run_validate_all(
    config: &Config,
    options: ValidateAllOptions,
    reporter: &dyn BatchProgressReporter,
) -> Result<ValidateAllStats> {
    let path = config.data.ideas_path.clone();
    let mut doc = load_document(&path)?;

    let mut run_config = config.clone();
    if options.internal_only {
        run_config.search.enabled = false;
    }
    let repository = Arc::new(IdeaRepository::from_ideas(doc.ideas.clone()));
    let service = ValidationService::from_config(&run_config, repository)?;

    let total = selection_len(&doc, config, options.sample);
    let batch_size = config.batch.batch_size.max(1);
    let started = Instant::now();
    let mut stats = ValidateAllStats {
        sample_mode: options.sample,
        ..Default::default()
    };

    tracing::info!(
        total,
        batch_size,
        internal_only = options.internal_only,
        search = service.aggregator().search().is_enabled(),
        "starting validation run"
    );

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);

        let pending: Vec<usize> = (start..end)
            .filter(|&i| !(options.skip_existing && doc.ideas[i].is_validated()))
            .collect();
        stats.skipped_ideas += (end - start) - pending.len();

        let outcomes = join_all(pending.iter().map(|&i| service.validate(&doc.ideas[i]))).await;
        for (i, outcome) in pending.into_iter().zip(outcomes) {
            if search_failed(&outcome) {
                stats.errors += 1;
            }
            tracing::debug!(
                idea = %doc.ideas[i].name,
                status = outcome.validation.status.as_str(),
                competitors = outcome.saturation.competitor_count,
                "validated"
            );
            doc.ideas[i].apply_outcome(outcome);
            stats.validated_ideas += 1;
        }
        stats.total_ideas = end;

        if !options.sample {
            record_validation(&mut doc, &stats, false);
            save_document(&path, &doc)?;
        }

        reporter.report(&BatchProgress {
            command: "validate-all",
            processed: end,
            total,
            validated: stats.validated_ideas,
            skipped: stats.skipped_ideas,
            errors: stats.errors,
        });

        start = end;
        if start < total && config.batch.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.batch.delay_ms)).await;
        }
    }

    service.aggregator().search().shutdown().await;

    if !options.sample {
        record_validation(&mut doc, &stats, true);
        save_document(&path, &doc)?;
    }

    println!("Validation {}", if options.sample { "sample complete" } else { "complete" });
    println!("  Ideas processed: {}", stats.total_ideas);
    println!("  Ideas validated: {}", stats.validated_ideas);
    println!("  Ideas skipped:   {}", stats.skipped_ideas);
    println!("  Errors:          {}", stats.errors);
    println!("  Time taken:      {:.2}s", started.elapsed().as_secs_f64());
    if options.sample {
        println!();
        println!(
            "Sample mode: nothing was written. Run without --sample to process all {} ideas.",
            doc.ideas.len()
        );
    } else {
        println!("  Updated file:    {}", path.display());
    }

    Ok(stats)
}

/// Category from well-known tags, `other` when none match.
pub fn infer_category(tags: &[String]) -> &'static str {
    const RULES: &[(&str, &[&str])] = &[
        ("tech", &["ai", "saas", "api", "web", "mobile", "cloud"]),
        ("healthcare", &["healthcare", "health", "medical"]),
        ("education", &["education", "learning", "course"]),
        ("finance", &["finance", "financial", "payment"]),
        ("retail", &["e-commerce", "ecommerce", "retail"]),
        ("food", &["food", "restaurant"]),
        ("travel", &["travel", "trip"]),
        ("real-estate", &["real estate", "property"]),
        ("gaming", &["gaming", "game"]),
    ];
    let lower: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    RULES
        .iter()
        .find(|(_, words)| lower.iter().any(|t| words.contains(&t.as_str())))
        .map(|(category, _)| *category)
        .unwrap_or("other")
}

/// Internal-only verdict for one idea. Saturation uses the max-of-sources
/// reduction, since there is no aggregated score to reuse.
pub fn enrichment_outcome(idea: &Idea, corpus: &[Idea]) -> ValidationOutcome {
    let internal = validate_internally(idea, corpus);
    let aggregated_score = AggregatedScore {
        total_competitors: internal.similar_ideas,
        avg_similarity: internal.similarity_score,
        confidence: INTERNAL_CONFIDENCE,
        sources_count: 1,
    };
    let status = if internal.similar_ideas > 0 {
        ValidationStatus::Verified
    } else {
        ValidationStatus::Unverified
    };
    let sources = vec![SourceResult::InternalDatabase(internal)];
    let saturation = saturation::from_source_list(&sources);
    ValidationOutcome {
        validation: ValidationResult {
            sources,
            aggregated_score,
            status,
        },
        saturation,
    }
}

/// Fills in validation, saturation and category for ideas that lack them.
pub async fn run_enrich(
    config: &Config,
    sample: bool,
    reporter: &dyn BatchProgressReporter,
) -> Result<EnrichStats> {
    let path = config.data.ideas_path.clone();
    let mut doc = load_document(&path)?;
    let corpus: Arc<[Idea]> = doc.ideas.clone().into();

    let total = selection_len(&doc, config, sample);
    let batch_size = config.batch.batch_size.max(1);
    let started = Instant::now();
    let mut stats = EnrichStats {
        sample_mode: sample,
        ..Default::default()
    };

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);

        let batch: Vec<Idea> = doc.ideas[start..end].to_vec();
        let corpus = Arc::clone(&corpus);
        let enriched = tokio::task::spawn_blocking(move || {
            batch
                .into_iter()
                .map(|mut idea| {
                    if !idea.is_validated() {
                        let outcome = enrichment_outcome(&idea, &corpus);
                        if idea.category.as_deref().map_or(true, str::is_empty) {
                            idea.category = Some(infer_category(&idea.tags).to_string());
                        }
                        idea.apply_outcome(outcome);
                    }
                    idea
                })
                .collect::<Vec<Idea>>()
        })
        .await?;

        stats.enriched_ideas += enriched.iter().filter(|i| i.is_validated()).count();
        for (slot, idea) in doc.ideas[start..end].iter_mut().zip(enriched) {
            *slot = idea;
        }
        stats.total_ideas = end;

        reporter.report(&BatchProgress {
            command: "enrich",
            processed: end,
            total,
            validated: stats.enriched_ideas,
            skipped: 0,
            errors: 0,
        });
        start = end;
    }

    doc.metadata.insert(
        "enrichment".to_string(),
        serde_json::json!({
            "processed": Utc::now().to_rfc3339(),
            "totalIdeas": stats.total_ideas,
            "enrichedIdeas": stats.enriched_ideas,
            "sampleMode": sample,
        }),
    );

    println!("Enrichment {}", if sample { "sample complete" } else { "complete" });
    println!("  Ideas processed: {}", stats.total_ideas);
    println!("  Ideas enriched:  {}", stats.enriched_ideas);
    println!("  Time taken:      {:.2}s", started.elapsed().as_secs_f64());

    if sample {
        println!();
        println!(
            "Sample mode: nothing was written. Run without --sample to process all {} ideas.",
            doc.ideas.len()
        );
    } else {
        save_document(&path, &doc)?;
        println!("  Updated file:    {}", path.display());
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use ideavoid_core::models::MarketType;

    fn write_ideas(dir: &std::path::Path, ideas: serde_json::Value) -> Config {
        let path = dir.join("ideas.json");
        std::fs::write(
            &path,
            serde_json::to_string(&serde_json::json!({ "ideas": ideas, "metadata": {} })).unwrap(),
        )
        .unwrap();
        let mut config = Config::minimal();
        config.data.ideas_path = path;
        config.batch.batch_size = 2;
        config.batch.delay_ms = 0;
        config
    }

    fn sample_ideas() -> serde_json::Value {
        serde_json::json!([
            {"name": "Meal Planner", "description": "Plan weekly meals for busy families", "tags": ["food"]},
            {"name": "Meal Planner Pro", "description": "Plan weekly meals for busy parents", "tags": ["food"]},
            {"name": "Quantum compiler", "description": "Optimize circuits for qubits", "tags": ["AI"]},
            {"name": "Dog walker", "description": "Find dog walkers nearby", "tags": []}
        ])
    }

    #[test]
    fn test_infer_category() {
        assert_eq!(infer_category(&["SaaS".to_string()]), "tech");
        assert_eq!(infer_category(&["Real Estate".to_string()]), "real-estate");
        assert_eq!(infer_category(&["restaurant".to_string(), "ai".to_string()]), "tech");
        assert_eq!(infer_category(&[]), "other");
    }

    #[test]
    fn test_enrichment_outcome_uses_internal_only() {
        let corpus: Vec<Idea> = serde_json::from_value(sample_ideas()).unwrap();
        let mut corpus = corpus;
        for (i, idea) in corpus.iter_mut().enumerate() {
            idea.id = Some(i as u64 + 1);
        }
        let outcome = enrichment_outcome(&corpus[0], &corpus);
        assert_eq!(outcome.validation.status, ValidationStatus::Verified);
        assert_eq!(outcome.validation.aggregated_score.confidence, INTERNAL_CONFIDENCE);
        assert_eq!(outcome.validation.aggregated_score.sources_count, 1);
        assert_eq!(
            outcome.saturation.competitor_count,
            outcome.validation.aggregated_score.total_competitors
        );
        assert_eq!(outcome.saturation.market_type, MarketType::BlueOcean);

        let lonely = enrichment_outcome(&corpus[3], &corpus);
        assert_eq!(lonely.validation.status, ValidationStatus::Unverified);
    }

    #[tokio::test]
    async fn test_enrich_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_ideas(dir.path(), sample_ideas());

        let stats = run_enrich(&config, false, &NoProgress).await.unwrap();
        assert_eq!(stats.total_ideas, 4);
        assert_eq!(stats.enriched_ideas, 4);

        let doc = load_document(&config.data.ideas_path).unwrap();
        assert!(doc.ideas.iter().all(Idea::is_validated));
        assert_eq!(doc.ideas[0].category.as_deref(), Some("food"));
        assert_eq!(doc.ideas[2].category.as_deref(), Some("tech"));
        assert_eq!(doc.ideas[3].category.as_deref(), Some("other"));
        assert_eq!(doc.metadata["enrichment"]["enrichedIdeas"], 4);
    }

    #[tokio::test]
    async fn test_enrich_sample_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_ideas(dir.path(), sample_ideas());
        config.batch.sample_size = 2;

        let stats = run_enrich(&config, true, &NoProgress).await.unwrap();
        assert_eq!(stats.total_ideas, 2);

        let doc = load_document(&config.data.ideas_path).unwrap();
        assert!(doc.ideas.iter().all(|i| !i.is_validated()));
    }

    #[tokio::test]
    async fn test_validate_all_checkpoints_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_ideas(dir.path(), sample_ideas());

        let stats = run_validate_all(&config, ValidateAllOptions::default(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(stats.total_ideas, 4);
        assert_eq!(stats.validated_ideas, 4);
        assert_eq!(stats.errors, 0);

        let doc = load_document(&config.data.ideas_path).unwrap();
        assert!(doc.ideas.iter().all(Idea::is_validated));
        let meta = &doc.metadata["validation"];
        assert_eq!(meta["completed"], true);
        assert_eq!(meta["inProgress"], false);
        assert_eq!(meta["validatedIdeas"], 4);
        for idea in &doc.ideas {
            let v = idea.validation.as_ref().unwrap();
            let s = idea.saturation.as_ref().unwrap();
            assert_eq!(s.competitor_count, v.aggregated_score.total_competitors);
        }
    }

    #[tokio::test]
    async fn test_validate_all_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_ideas(dir.path(), sample_ideas());
        run_enrich(&config, false, &NoProgress).await.unwrap();

        let options = ValidateAllOptions {
            skip_existing: true,
            ..Default::default()
        };
        let stats = run_validate_all(&config, options, &NoProgress).await.unwrap();
        assert_eq!(stats.skipped_ideas, 4);
        assert_eq!(stats.validated_ideas, 0);
    }
}
