//! Network retrieval of bill documents with fallback and retry.
//!
//! Resolution and retrieval are separate steps. [`DocumentFetcher::resolve`]
//! walks the candidate URLs with cheap HEAD probes until one answers,
//! recording the winner and its Content-Length hint; [`DocumentFetcher::fetch`]
//! downloads the resolved URL and validates that the body is a PDF before
//! extracting text. Transient failures (timeouts, 5xx, 429) are retried per
//! URL with jittered exponential backoff; permanent failures (404 and other
//! 4xx) advance to the next candidate immediately.

use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rand::Rng;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::locator::{DocumentKind, DocumentReference};
use crate::pdf;

/// A retrieved document with its extracted text.
///
/// Owned exclusively by the pipeline invocation that fetched it; raw bytes
/// are never cached.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub reference: DocumentReference,
    pub raw_bytes: Vec<u8>,
    pub extracted_text: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("no candidate URL answered for the {kind} of {identifier}")]
    #[diagnostic(
        code(billscope::fetcher::not_found),
        help("The document may not exist for this session, or the publishing site changed its layout.")
    )]
    NotFound {
        identifier: String,
        kind: DocumentKind,
    },

    #[error("transport error fetching {url}: {source}")]
    #[diagnostic(code(billscope::fetcher::transport))]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    #[diagnostic(code(billscope::fetcher::status))]
    Status { url: String, status: StatusCode },

    #[error("{url} did not return a PDF document")]
    #[diagnostic(code(billscope::fetcher::not_pdf))]
    NotPdf { url: String },
}

/// Tunables for probing and downloading.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub attempts_per_url: u32,
    pub backoff_base: Duration,
    /// The publishing site serves a broken certificate chain; verification is
    /// skipped by default.
    pub accept_invalid_certs: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(60),
            attempts_per_url: 2,
            backoff_base: Duration::from_millis(250),
            accept_invalid_certs: true,
        }
    }
}

enum Probe {
    Hit { content_length: Option<u64> },
    Miss,
}

/// HTTP client for bill documents.
pub struct DocumentFetcher {
    client: Client,
    config: FetcherConfig,
}

impl DocumentFetcher {
    pub fn new(config: FetcherConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, config })
    }

    /// Resolve `reference` to a live URL by probing candidates in order.
    ///
    /// Already-resolved references pass through untouched; resolution is
    /// permanent for the reference's lifetime.
    pub async fn resolve(
        &self,
        mut reference: DocumentReference,
    ) -> Result<DocumentReference, FetchError> {
        if reference.is_resolved() {
            return Ok(reference);
        }
        for url in reference.candidate_urls.clone() {
            match self.probe(&url).await {
                Probe::Hit { content_length } => {
                    info!(
                        url = %url,
                        content_length = ?content_length,
                        kind = %reference.kind,
                        "candidate resolved"
                    );
                    reference.resolved_url = Some(url);
                    reference.content_length = content_length;
                    return Ok(reference);
                }
                Probe::Miss => continue,
            }
        }
        Err(FetchError::NotFound {
            identifier: reference.identifier.canonical(),
            kind: reference.kind,
        })
    }

    /// Download the referenced document, resolving first if needed.
    ///
    /// Success requires an HTTP success status and a non-empty body carrying
    /// the PDF signature. Text extraction is best effort; an empty extraction
    /// is not a failure.
    pub async fn fetch(&self, reference: DocumentReference) -> Result<FetchedDocument, FetchError> {
        let reference = self.resolve(reference).await?;
        let url = match reference.resolved_url.clone() {
            Some(url) => url,
            None => {
                return Err(FetchError::NotFound {
                    identifier: reference.identifier.canonical(),
                    kind: reference.kind,
                })
            }
        };

        let raw_bytes = self.download(&url).await?;
        if !pdf::looks_like_pdf(&raw_bytes) {
            return Err(FetchError::NotPdf { url });
        }
        let extracted_text = pdf::extract_text(&raw_bytes);
        info!(
            url = %url,
            bytes = raw_bytes.len(),
            chars = extracted_text.len(),
            "document fetched"
        );
        Ok(FetchedDocument {
            reference,
            raw_bytes,
            extracted_text,
            fetched_at: Utc::now(),
        })
    }

    async fn probe(&self, url: &str) -> Probe {
        for attempt in 1..=self.config.attempts_per_url.max(1) {
            let response = self
                .client
                .head(url)
                .timeout(self.config.probe_timeout)
                .send()
                .await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let content_length = resp
                        .headers()
                        .get(header::CONTENT_LENGTH)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());
                    return Probe::Hit { content_length };
                }
                Ok(resp) if is_transient(resp.status()) => {
                    debug!(url = %url, status = %resp.status(), attempt, "probe failed, will retry");
                }
                Ok(resp) => {
                    debug!(url = %url, status = %resp.status(), "probe failed, next candidate");
                    return Probe::Miss;
                }
                Err(error) => {
                    debug!(url = %url, error = %error, attempt, "probe transport error");
                }
            }
            if attempt < self.config.attempts_per_url {
                self.backoff(attempt).await;
            }
        }
        Probe::Miss
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut last: Option<FetchError> = None;
        let attempts = self.config.attempts_per_url.max(1);
        for attempt in 1..=attempts {
            match self
                .client
                .get(url)
                .timeout(self.config.fetch_timeout)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.bytes().await {
                            Ok(body) if !body.is_empty() => return Ok(body.to_vec()),
                            Ok(_) => {
                                return Err(FetchError::NotPdf {
                                    url: url.to_string(),
                                })
                            }
                            Err(source) => {
                                last = Some(FetchError::Transport {
                                    url: url.to_string(),
                                    source,
                                });
                            }
                        }
                    } else if is_transient(status) {
                        warn!(url = %url, status = %status, attempt, "download failed, will retry");
                        last = Some(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    } else {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                }
                Err(source) => {
                    warn!(url = %url, error = %source, attempt, "download transport error");
                    last = Some(FetchError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            }
            if attempt < attempts {
                self.backoff(attempt).await;
            }
        }
        Err(last.expect("at least one download attempt was made"))
    }

    async fn backoff(&self, attempt: u32) {
        let base = self.config.backoff_base * 2u32.saturating_pow(attempt - 1);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=50));
        tokio::time::sleep(base + jitter).await;
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
