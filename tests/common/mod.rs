//! Shared helpers for integration tests: scripted model clients, fast
//! fetcher settings, and a generator for small, well-formed PDFs so text
//! extraction is exercised for real.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::MockServer;

use billscope::analysis::model::{CompletionRequest, ModelClient, ModelConfig, ModelError};
use billscope::config::ServiceConfig;
use billscope::fetcher::FetcherConfig;

/// Model client with canned answers and call accounting.
///
/// Fiscal invocations are recognized by their prompt and answered with
/// `fiscal`; everything else gets `summary`.
pub struct ScriptedModel {
    summary: String,
    fiscal: String,
    delay: Duration,
    calls: AtomicUsize,
    fiscal_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(summary: impl Into<String>, fiscal: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            fiscal: fiscal.into(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            fiscal_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fiscal_calls(&self) -> usize {
        self.fiscal_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("fiscal note") {
            self.fiscal_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.fiscal.clone())
        } else {
            Ok(self.summary.clone())
        }
    }
}

/// Model client whose endpoint is permanently down.
pub struct FailingModel {
    calls: AtomicUsize,
}

impl FailingModel {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for FailingModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Status {
            status: 503,
            body: "upstream unavailable".into(),
        })
    }
}

/// Fetcher settings tuned for mock servers: tiny backoff, no TLS quirks.
pub fn fast_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        probe_timeout: Duration::from_secs(2),
        fetch_timeout: Duration::from_secs(2),
        attempts_per_url: 2,
        backoff_base: Duration::from_millis(1),
        accept_invalid_certs: false,
    }
}

/// Service configuration pointed at a mock publishing site.
pub fn test_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig::new(ModelConfig::new(
        "http://inference.invalid",
        "test-key",
        "test-model",
    ))
    .with_base_url(server.base_url())
    .with_fetcher(fast_fetcher_config())
    .with_sync_wait(Duration::from_secs(5))
    .with_worker_count(1)
}

pub fn scripted(summary: &str, fiscal: &str) -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::new(summary, fiscal))
}

fn escape_pdf_string(line: &str) -> String {
    line.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Build a small, structurally valid PDF whose page shows `text`, one
/// source line per PDF text line. Offsets in the xref table are computed
/// from the actual byte positions, so standard extractors can parse it.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let mut ops = String::from("BT /F1 11 Tf 14 TL 50 770 Td\n");
    for line in text.lines() {
        ops.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    ops.push_str("ET");

    let objects = [
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n".to_string(),
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>\nendobj\n"
            .to_string(),
        format!(
            "4 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            ops.len(),
            ops
        ),
        "5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n".to_string(),
    ];

    let mut body = Vec::new();
    body.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for object in &objects {
        offsets.push(body.len());
        body.extend_from_slice(object.as_bytes());
    }

    let xref_offset = body.len();
    let mut xref = String::from("xref\n0 6\n0000000000 65535 f \n");
    for offset in &offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    body.extend_from_slice(xref.as_bytes());
    body.extend_from_slice(
        format!("trailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    body
}
