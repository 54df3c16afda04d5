//! # IdeaAvoid Core
//!
//! Shared, I/O-free logic for IdeaAvoid: the idea data model, the
//! similarity engine, the internal (corpus) validator, the saturation
//! calculator, aggregation scoring rules, a TTL cache, and the
//! [`search::SearchValidator`] seam implemented by the external search
//! validator in the application crate.
//!
//! This crate contains no tokio, filesystem, or network dependencies.
//!
//! ## Pipeline
//!
//! ```text
//! Idea ──▶ internal::validate_internally ──┐
//!      └─▶ SearchValidator (external) ─────┼─▶ scoring::aggregate_score
//!                                          │      ├─▶ scoring::determine_status
//!                                          │      └─▶ saturation::from_aggregated_score
//! ```

pub mod cache;
pub mod internal;
pub mod models;
pub mod saturation;
pub mod scoring;
pub mod search;
pub mod similarity;
