//! # Billscope: Texas Legislative Bill Analysis Pipeline
//!
//! Billscope resolves a free-form Texas bill reference, discovers and fetches
//! the bill's published PDF (and fiscal note, when one exists), produces an
//! AI-backed summary plus a structured fiscal-impact figure, and caches the
//! result so repeat queries are answered without touching the network or the
//! model again.
//!
//! ```text
//! raw input ──► identifier::BillIdentifier ──► cache (hit short-circuits)
//!                                                │ miss
//!                                                ▼
//!                    locator::candidate_urls ──► fetcher (probe + fetch)
//!                                                │
//!                     pdf::extract_text ◄────────┘
//!                                                │
//!                    analysis::AnalysisEngine (summary + fiscal extraction)
//!                                                │
//!                    cache::AnalysisCache ◄──────┴──► format (text / JSON)
//! ```
//!
//! Large documents are deferred to [`jobs`] workers pulling from a shared
//! queue; concurrent requests for the same bill are deduplicated through the
//! [`inflight`] registry so at most one full pipeline runs per identifier.
//!
//! The entry point for consumers is [`service::BillAnalysisService`], which
//! exposes the external contract: `analyze`, `analyze_structured`,
//! `cache_stats`, `cache_invalidate`, and `health`.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod identifier;
pub mod inflight;
pub mod jobs;
pub mod locator;
pub mod pdf;
pub mod pipeline;
pub mod service;
pub mod telemetry;

pub use error::{AnalysisError, ErrorKind};
pub use identifier::BillIdentifier;
pub use service::BillAnalysisService;
