//! # IdeaAvoid
//!
//! A catalog of business ideas with market-saturation validation.
//!
//! Each idea is checked against two independent sources: the rest of the
//! catalog (fuzzy similarity) and an external web search for competitors.
//! The verdicts are merged into a confidence-weighted validation status and
//! a saturation estimate (level, market type, TAM band), served over a JSON
//! HTTP API and computed in bulk by batch commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐
//! │  Repository  │   │ Search driver │
//! │ ideas.json   │   │ Chromium/HTTP │
//! └──────┬───────┘   └───────┬───────┘
//!        │ corpus            │ html
//!        ▼                   ▼
//!   ┌──────────┐       ┌──────────┐
//!   │ Internal │       │ External │
//!   │validator │       │validator │
//!   └────┬─────┘       └────┬─────┘
//!        └───────┬──────────┘
//!                ▼
//!         ┌────────────┐    ┌─────────┐
//!         │ Aggregator │──▶ │ Service │ (TTL cache)
//!         └────────────┘    └────┬────┘
//!                      ┌─────────┴─────────┐
//!                      ▼                   ▼
//!                ┌──────────┐        ┌──────────┐
//!                │   HTTP   │        │  Batch   │
//!                │  server  │        │ commands │
//!                └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ideavoid enrich --sample          # preview internal-only enrichment
//! ideavoid validate-all             # validate every idea, checkpointing
//! ideavoid progress                 # how far along is the catalog
//! ideavoid serve                    # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`repository`] | Idea document loading, querying, and saving |
//! | [`search`] | External search validator and page fetch drivers |
//! | [`aggregator`] | Concurrent source fan-out and verdict merging |
//! | [`service`] | Cache-through validation |
//! | [`batch`] | `validate-all` and `enrich` batch runs |
//! | [`progress`] | Batch progress reporting |
//! | [`stats`] | Validation progress report |
//! | [`export`] | Spreadsheet export |
//! | [`contributions`] | User-submitted corrections log |
//! | [`visitors`] | Visitor counters |
//! | [`rate_limit`] | Per-IP rate limiting middleware |
//! | [`server`] | JSON HTTP API |
//!
//! The pure algorithms (similarity, saturation, scoring, cache) live in the
//! `ideavoid-core` crate.

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod contributions;
pub mod export;
pub mod progress;
pub mod rate_limit;
pub mod repository;
pub mod search;
pub mod server;
pub mod service;
pub mod stats;
pub mod visitors;
