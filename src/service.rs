//! The injected service object exposing the external contract.
//!
//! One `BillAnalysisService` is constructed at process start and handed by
//! reference to whatever hosts it; the cache and in-flight registry it owns
//! are the only cross-request shared state. Request flow:
//!
//! 1. normalize the raw reference;
//! 2. serve from cache when possible;
//! 3. claim the in-flight slot, or wait on whoever holds it;
//! 4. resolve the bill URL (existence check + size estimate);
//! 5. run the pipeline inline, or defer to a background worker when the
//!    document is large, waiting up to the synchronous budget.
//!
//! Every failure renders as a well-formed reply; nothing here panics the
//! serving process for a single bad request.

use std::sync::Arc;

use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::analysis::model::{HttpModelClient, ModelClient};
use crate::analysis::{AnalysisEngine, AnalysisResult};
use crate::cache::{AnalysisCache, CacheStats};
use crate::config::{ConfigError, ServiceConfig};
use crate::error::{AnalysisError, AnalysisFailure, ErrorKind};
use crate::fetcher::DocumentFetcher;
use crate::format;
use crate::identifier::BillIdentifier;
use crate::inflight::{self, Claim, InflightMap};
use crate::jobs::{JobOrchestrator, JobState};
use crate::locator::{DocumentKind, DocumentReference};
use crate::pipeline::AnalysisPipeline;

/// Natural-language reply shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    pub response: String,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvalidateReply {
    pub success: bool,
}

/// Liveness snapshot for the health contract.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub cache_entries: usize,
    pub inflight: usize,
    pub model_configured: bool,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ServiceInitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    #[diagnostic(code(billscope::service::http_client))]
    HttpClient(#[from] reqwest::Error),
}

/// The bill analysis pipeline behind its external contract.
pub struct BillAnalysisService {
    config: ServiceConfig,
    cache: Arc<AnalysisCache>,
    inflight: InflightMap,
    fetcher: Arc<DocumentFetcher>,
    pipeline: Arc<AnalysisPipeline>,
    orchestrator: JobOrchestrator,
}

impl BillAnalysisService {
    /// Construct from explicit configuration and a model client.
    ///
    /// Must be called within a tokio runtime: background workers are
    /// spawned here.
    pub fn new(
        config: ServiceConfig,
        model: Arc<dyn ModelClient>,
    ) -> Result<Self, ServiceInitError> {
        let cache = Arc::new(AnalysisCache::new(config.cache_ttl));
        let fetcher = Arc::new(DocumentFetcher::new(config.fetcher.clone())?);
        let engine = AnalysisEngine::new(model);
        let pipeline = Arc::new(AnalysisPipeline::new(
            Arc::clone(&fetcher),
            engine,
            Arc::clone(&cache),
            config.base_url.clone(),
        ));
        let orchestrator = JobOrchestrator::start(config.worker_count, Arc::clone(&pipeline));
        Ok(Self {
            config,
            cache,
            inflight: InflightMap::new(),
            fetcher,
            pipeline,
            orchestrator,
        })
    }

    /// Construct from environment variables with the HTTP model client.
    pub fn from_env() -> Result<Self, ServiceInitError> {
        let config = ServiceConfig::from_env()?;
        let model = Arc::new(HttpModelClient::new(config.model.clone())?);
        Self::new(config, model)
    }

    /// Analyze a bill and render the natural-language reply.
    pub async fn analyze(&self, bill_number: &str) -> AgentReply {
        match self.analysis(bill_number).await {
            Ok(result) => AgentReply {
                response: format::render_text(&result),
                success: true,
            },
            Err(error) => AgentReply {
                response: user_message(&error, bill_number),
                success: false,
            },
        }
    }

    /// Analyze a bill and render the structured reply.
    pub async fn analyze_structured(&self, bill_number: &str) -> Value {
        match self.analysis(bill_number).await {
            Ok(result) => format::render_structured(&result),
            Err(error) => format::render_failure(error.kind(), &user_message(&error, bill_number)),
        }
    }

    /// Core operation behind both reply shapes.
    #[instrument(skip(self), fields(input = bill_number))]
    pub async fn analysis(
        &self,
        bill_number: &str,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let identifier = BillIdentifier::parse(bill_number, &self.config.session)?;
        if let Some(hit) = self.cache.get(&identifier) {
            info!(bill = %identifier.canonical(), "cache hit");
            return Ok(hit);
        }

        match self.inflight.claim(&identifier.cache_key()) {
            Claim::Waiter(rx) => {
                info!(bill = %identifier.canonical(), "joining in-flight analysis");
                match inflight::wait_for(rx, self.config.sync_wait).await {
                    Some(Ok(result)) => Ok(result),
                    Some(Err(failure)) => Err(failure.into_error()),
                    None => Err(AnalysisError::AnalysisPending {
                        identifier: identifier.canonical(),
                    }),
                }
            }
            Claim::Owner(slot) => {
                // An analysis may have landed between the cache miss and the
                // claim; a second look avoids rerunning it.
                if let Some(hit) = self.cache.get(&identifier) {
                    slot.publish(Ok(Arc::clone(&hit)));
                    return Ok(hit);
                }
                self.run_owned(identifier, slot).await
            }
        }
    }

    async fn run_owned(
        &self,
        identifier: BillIdentifier,
        slot: crate::inflight::InflightSlot,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let reference =
            DocumentReference::new(identifier.clone(), DocumentKind::BillText, &self.config.base_url);
        let reference = match self.fetcher.resolve(reference).await {
            Ok(reference) => reference,
            Err(error) => {
                let error = match error {
                    crate::fetcher::FetchError::NotFound { .. } => AnalysisError::BillNotFound {
                        identifier: identifier.canonical(),
                    },
                    other => AnalysisError::FetchFailed {
                        url: String::new(),
                        message: other.to_string(),
                    },
                };
                slot.publish(Err(AnalysisFailure::from(&error)));
                return Err(error);
            }
        };

        let oversized = reference
            .content_length
            .is_some_and(|length| length > self.config.background_threshold_bytes);

        if oversized {
            info!(
                bill = %identifier.canonical(),
                content_length = ?reference.content_length,
                "document exceeds synchronous budget, deferring to worker"
            );
            let mut handle = self.orchestrator.submit(reference, slot);
            match handle.wait(self.config.sync_wait).await {
                Some(JobState::Succeeded(result)) => Ok(result),
                Some(JobState::Failed(failure)) => Err(failure.into_error()),
                Some(_) | None => Err(AnalysisError::AnalysisPending {
                    identifier: identifier.canonical(),
                }),
            }
        } else {
            match self.pipeline.execute(reference).await {
                Ok(result) => {
                    slot.publish(Ok(Arc::clone(&result)));
                    Ok(result)
                }
                Err(error) => {
                    warn!(bill = %identifier.canonical(), error = %error, "analysis failed");
                    slot.publish(Err(AnalysisFailure::from(&error)));
                    Err(error)
                }
            }
        }
    }

    /// Hit/miss accounting for the completed-result cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop the cached analysis for a bill. `success` reports whether an
    /// entry existed.
    pub fn cache_invalidate(&self, bill_number: &str) -> InvalidateReply {
        match BillIdentifier::parse(bill_number, &self.config.session) {
            Ok(identifier) => {
                let removed = self.cache.invalidate(&identifier);
                info!(bill = %identifier.canonical(), removed, "cache invalidation requested");
                InvalidateReply { success: removed }
            }
            Err(_) => InvalidateReply { success: false },
        }
    }

    /// Process and dependency liveness.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            ok: true,
            cache_entries: self.cache.len(),
            inflight: self.inflight.len(),
            model_configured: !self.config.model.endpoint.trim().is_empty(),
        }
    }

    /// Stop background workers gracefully.
    pub async fn shutdown(self) {
        self.orchestrator.shutdown().await;
    }
}

/// Human-readable explanation for a failed request. Never a stack trace.
fn user_message(error: &AnalysisError, raw_input: &str) -> String {
    match error.kind() {
        ErrorKind::InvalidIdentifier => format!(
            "{raw_input:?} does not look like a Texas bill reference. \
             Try a form such as \"HB 150\" or \"Senate Bill 12\"."
        ),
        ErrorKind::BillNotFound => format!(
            "Bill {} could not be found on the legislature's publishing site. \
             Verify the bill number and session.",
            raw_input.trim()
        ),
        ErrorKind::FetchFailed => {
            "The bill document could not be retrieved right now. Please try again shortly."
                .to_string()
        }
        ErrorKind::ModelUnavailable => {
            "The analysis service is temporarily unavailable. Please try again shortly."
                .to_string()
        }
        ErrorKind::AnalysisPending => format!(
            "The analysis of {} is still running; large bills can take a while. \
             Ask again in a moment.",
            raw_input.trim()
        ),
    }
}
