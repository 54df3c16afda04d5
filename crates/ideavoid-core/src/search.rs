//! The external search validator seam.
//!
//! The application crate implements [`SearchValidator`] on top of a headless
//! browser or plain HTTP; tests substitute counting stubs.

use async_trait::async_trait;

use crate::models::{ExternalSource, Idea};

/// An independent, cacheable competitor search for an idea.
///
/// Implementations must not fail: network or parsing problems are reported
/// through [`ExternalSource::error`] with zero counts, and a disabled
/// validator returns [`ExternalSource::disabled`].
#[async_trait]
pub trait SearchValidator: Send + Sync {
    /// Whether searches are performed at all.
    fn is_enabled(&self) -> bool;

    /// Searches for competitors of `idea`.
    ///
    /// With `bypass_cache` the cached entry for this idea is dropped before
    /// searching.
    async fn validate_with_search(&self, idea: &Idea, bypass_cache: bool) -> ExternalSource;

    /// Drops the cached result for `idea`, if any.
    fn clear_cache(&self, idea: &Idea);

    /// Releases long-lived resources. Must be idempotent.
    async fn shutdown(&self) {}
}
