//! The fetch → extract → analyze → cache execution.
//!
//! One pipeline instance is shared by the inline request path and the
//! background workers; both hand it a bill reference (already resolved by
//! the service) and get back the cached, immutable [`AnalysisResult`].
//! Fiscal-note problems below the model degrade the result; a model outage
//! aborts the request before anything is written to the cache.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::analysis::{self, AnalysisEngine, AnalysisResult};
use crate::cache::AnalysisCache;
use crate::error::AnalysisError;
use crate::fetcher::{DocumentFetcher, FetchError, FetchedDocument};
use crate::identifier::BillIdentifier;
use crate::locator::{DocumentKind, DocumentReference};

pub struct AnalysisPipeline {
    fetcher: Arc<DocumentFetcher>,
    engine: AnalysisEngine,
    cache: Arc<AnalysisCache>,
    base_url: String,
}

impl AnalysisPipeline {
    pub fn new(
        fetcher: Arc<DocumentFetcher>,
        engine: AnalysisEngine,
        cache: Arc<AnalysisCache>,
        base_url: String,
    ) -> Self {
        Self {
            fetcher,
            engine,
            cache,
            base_url,
        }
    }

    /// Run the full analysis for one bill reference.
    #[instrument(skip(self, reference), fields(bill = %reference.identifier.canonical()))]
    pub async fn execute(
        &self,
        reference: DocumentReference,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let identifier = reference.identifier.clone();
        let bill = self
            .fetcher
            .fetch(reference)
            .await
            .map_err(|error| fetch_error(error, &identifier))?;
        let Some(bill_url) = bill.reference.resolved_url.clone() else {
            return Err(AnalysisError::FetchFailed {
                url: String::new(),
                message: "bill reference lost its resolution".into(),
            });
        };
        info!(chars = bill.extracted_text.len(), "bill text extracted");

        let bill_summary = self
            .engine
            .summarize_bill(&identifier, &bill.extracted_text)
            .await?;

        let mut fiscal_note_summary = None;
        let mut total_fiscal_impact = None;
        let mut fiscal_note_url = None;
        if analysis::fiscal_note_relevant(&bill.extracted_text) {
            if let Some(note) = self.fetch_fiscal_note(&identifier).await {
                if note.extracted_text.trim().is_empty() {
                    debug!("fiscal note had no extractable text, skipping fiscal analysis");
                } else {
                    let fiscal = self
                        .engine
                        .analyze_fiscal_note(&identifier, &note.extracted_text)
                        .await?;
                    fiscal_note_summary = Some(fiscal.summary);
                    total_fiscal_impact = fiscal.total;
                    fiscal_note_url = note.reference.resolved_url.clone();
                }
            }
        } else {
            debug!("bill text shows no fiscal relevance, skipping fiscal note");
        }

        let result = Arc::new(AnalysisResult {
            identifier,
            bill_summary,
            fiscal_note_summary,
            total_fiscal_impact,
            bill_url,
            fiscal_note_url,
            computed_at: Utc::now(),
        });
        self.cache.put(Arc::clone(&result));
        info!(
            fiscal = result.has_fiscal_note(),
            "analysis complete and cached"
        );
        Ok(result)
    }

    /// Locate and fetch the fiscal note, absorbing every failure into "no
    /// note": a missing or unreachable fiscal note never fails the bill.
    async fn fetch_fiscal_note(&self, identifier: &BillIdentifier) -> Option<FetchedDocument> {
        let reference =
            DocumentReference::new(identifier.clone(), DocumentKind::FiscalNote, &self.base_url);
        match self.fetcher.fetch(reference).await {
            Ok(document) => Some(document),
            Err(FetchError::NotFound { .. }) => {
                debug!(bill = %identifier.canonical(), "no fiscal note discovered");
                None
            }
            Err(error) => {
                warn!(
                    bill = %identifier.canonical(),
                    error = %error,
                    "fiscal note fetch failed, continuing without it"
                );
                None
            }
        }
    }
}

fn fetch_error(error: FetchError, identifier: &BillIdentifier) -> AnalysisError {
    match error {
        FetchError::NotFound { .. } => AnalysisError::BillNotFound {
            identifier: identifier.canonical(),
        },
        FetchError::Transport { url, source } => AnalysisError::FetchFailed {
            url,
            message: source.to_string(),
        },
        FetchError::Status { url, status } => AnalysisError::FetchFailed {
            url,
            message: format!("HTTP {status}"),
        },
        FetchError::NotPdf { url } => AnalysisError::FetchFailed {
            url,
            message: "response was not a PDF document".into(),
        },
    }
}
