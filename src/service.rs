//! Cache-through validation service.
//!
//! Outcomes are memoised per idea (`validation_<id>`, or
//! `validation_<name>` for unpersisted ideas, falling back to the
//! description when unnamed) for the configured TTL.
//! [`ValidationService::validate_fresh`] drops both this cache's entry and
//! the search validator's entry, then recomputes with the search cache
//! bypassed for that call only.

use ideavoid_core::cache::{CacheStats, TtlCache};
use ideavoid_core::models::{Idea, ValidationOutcome};
use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::{Aggregator, ValidationContext};
use crate::config::Config;
use crate::repository::IdeaRepository;
use crate::search::ExternalSearchValidator;

pub struct ValidationService {
    aggregator: Aggregator,
    repository: Arc<IdeaRepository>,
    cache: TtlCache<ValidationOutcome>,
}

impl ValidationService {
    pub fn new(aggregator: Aggregator, repository: Arc<IdeaRepository>, ttl: Duration) -> Self {
        Self {
            aggregator,
            repository,
            cache: TtlCache::new(ttl),
        }
    }

    /// Wires the default validators from configuration.
    pub fn from_config(config: &Config, repository: Arc<IdeaRepository>) -> anyhow::Result<Self> {
        let search = Arc::new(ExternalSearchValidator::from_config(&config.search)?);
        let aggregator = Aggregator::with_search(config.validation.internal_enabled, search);
        Ok(Self::new(
            aggregator,
            repository,
            Duration::from_secs(config.validation.cache_ttl_secs),
        ))
    }

    pub fn cache_key(idea: &Idea) -> String {
        match idea.id {
            Some(id) => format!("validation_{}", id),
            None if idea.name.is_empty() => format!("validation_{}", idea.description),
            None => format!("validation_{}", idea.name),
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn repository(&self) -> &Arc<IdeaRepository> {
        &self.repository
    }

    pub async fn validate(&self, idea: &Idea) -> ValidationOutcome {
        let key = Self::cache_key(idea);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(%key, "validation cache hit");
            return hit;
        }
        self.compute(idea, key, ValidationContext::default()).await
    }

    pub async fn validate_fresh(&self, idea: &Idea) -> ValidationOutcome {
        let key = Self::cache_key(idea);
        self.cache.remove(&key);
        self.aggregator.search().clear_cache(idea);
        self.compute(idea, key, ValidationContext::fresh()).await
    }

    async fn compute(&self, idea: &Idea, key: String, ctx: ValidationContext) -> ValidationOutcome {
        let corpus = self.repository.snapshot().corpus();
        let outcome = self.aggregator.aggregate(idea, corpus, ctx).await;
        self.cache.insert(key, outcome.clone());
        outcome
    }

    /// The cached outcome for `idea`, without computing one.
    pub fn cached(&self, idea: &Idea) -> Option<ValidationOutcome> {
        self.cache.get(&Self::cache_key(idea))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ideavoid_core::internal::{validate_internally, InternalValidator};
    use ideavoid_core::models::{ExternalSource, InternalSource};
    use ideavoid_core::search::SearchValidator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingInternal {
        calls: AtomicUsize,
    }

    impl InternalValidator for CountingInternal {
        fn validate(&self, idea: &Idea, corpus: &[Idea]) -> InternalSource {
            self.calls.fetch_add(1, Ordering::SeqCst);
            validate_internally(idea, corpus)
        }
    }

    #[derive(Default)]
    struct CountingSearch {
        calls: AtomicUsize,
        cleared: AtomicUsize,
        bypass_flags: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl SearchValidator for CountingSearch {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn validate_with_search(&self, _idea: &Idea, bypass_cache: bool) -> ExternalSource {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bypass_flags.lock().unwrap().push(bypass_cache);
            ExternalSource {
                competitor_count: 3,
                total_results: 8,
                competitors: vec![],
                enabled: true,
                error: None,
                last_checked: Utc::now(),
            }
        }

        fn clear_cache(&self, _idea: &Idea) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (ValidationService, Arc<CountingInternal>, Arc<CountingSearch>) {
        let internal = Arc::new(CountingInternal::default());
        let search = Arc::new(CountingSearch::default());
        let repo = Arc::new(IdeaRepository::from_ideas(vec![
            Idea::new("Meal Planner", "Plan weekly meals", vec!["food".into()]),
            Idea::new("Meal Planner Pro", "Plan weekly meals fast", vec!["food".into()]),
        ]));
        let aggregator = Aggregator::new(true, internal.clone(), search.clone());
        let service = ValidationService::new(aggregator, repo, Duration::from_secs(60));
        (service, internal, search)
    }

    #[tokio::test]
    async fn test_second_validate_is_served_from_cache() {
        let (service, internal, search) = setup();
        let idea = service.repository().snapshot().get(1).cloned().unwrap();

        let first = service.validate(&idea).await;
        let second = service.validate(&idea).await;

        assert_eq!(first, second);
        assert_eq!(internal.calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_fresh_always_recomputes_and_bypasses_search_cache() {
        let (service, internal, search) = setup();
        let idea = service.repository().snapshot().get(1).cloned().unwrap();

        service.validate(&idea).await;
        service.validate_fresh(&idea).await;
        service.validate_fresh(&idea).await;

        assert_eq!(internal.calls.load(Ordering::SeqCst), 3);
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert_eq!(search.cleared.load(Ordering::SeqCst), 2);
        assert_eq!(*search.bypass_flags.lock().unwrap(), vec![false, true, true]);

        // The fresh result replaces the cached one; later calls do not bypass.
        service.validate(&idea).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_fresh_does_not_leak_bypass() {
        let (service, _internal, search) = setup();
        let snapshot = service.repository().snapshot();
        let a = snapshot.get(1).cloned().unwrap();
        let b = snapshot.get(2).cloned().unwrap();

        tokio::join!(service.validate_fresh(&a), service.validate(&b));

        let mut flags = search.bypass_flags.lock().unwrap().clone();
        flags.sort();
        assert_eq!(flags, vec![false, true]);
    }

    #[tokio::test]
    async fn test_cached_peek_and_clear() {
        let (service, _internal, _search) = setup();
        let idea = Idea::new("Ad hoc", "Something new", vec![]);
        assert!(service.cached(&idea).is_none());
        service.validate(&idea).await;
        assert!(service.cached(&idea).is_some());
        service.clear();
        assert!(service.cached(&idea).is_none());
    }

    #[test]
    fn test_cache_key() {
        let mut idea = Idea::new("Thing", "", vec![]);
        assert_eq!(ValidationService::cache_key(&idea), "validation_Thing");
        idea.id = Some(12);
        assert_eq!(ValidationService::cache_key(&idea), "validation_12");
        let unnamed = Idea::new("", "Only a description", vec![]);
        assert_eq!(
            ValidationService::cache_key(&unnamed),
            "validation_Only a description"
        );
    }
}
