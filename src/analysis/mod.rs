//! AI-driven analysis of bill and fiscal-note text.
//!
//! The engine performs at most two model invocations per bill: one summary
//! over the bill text and, when a fiscal note was found and judged relevant,
//! one structured extraction over the note. Free-form model output is turned
//! into a monetary figure by the pure parser in [`fiscal`]; an unparseable
//! figure degrades the result instead of failing the request, while a model
//! that stays unreachable past its retry budget fails the request without
//! touching the cache.

pub mod fiscal;
pub mod model;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::identifier::BillIdentifier;
use model::{CompletionRequest, ModelClient};

/// Keywords whose presence in the bill text makes a fiscal note worth
/// chasing.
const FISCAL_KEYWORDS: [&str; 12] = [
    "appropriation",
    "funding",
    "budget",
    "fiscal impact",
    "cost",
    "revenue",
    "expenditure",
    "million",
    "billion",
    "grant",
    "allocation",
    "financial",
];

/// True when the bill text suggests the bill has monetary consequences.
pub fn fiscal_note_relevant(bill_text: &str) -> bool {
    let lower = bill_text.to_lowercase();
    FISCAL_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Prompt budget in characters, shrinking as documents grow so huge bills
/// still fit the model's context.
pub fn text_budget(text: &str) -> usize {
    let chars = text.chars().count();
    if chars < 50_000 {
        chars.min(10_000)
    } else if chars < 100_000 {
        8_000
    } else if chars < 150_000 {
        6_000
    } else {
        4_000
    }
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// The immutable unit of caching: everything one analysis produced.
///
/// Invariants: a bill with no discoverable fiscal note carries none of the
/// fiscal fields; `total_fiscal_impact` is never present without
/// `fiscal_note_summary` (an ambiguous extraction keeps the summary and
/// drops only the figure).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub identifier: BillIdentifier,
    pub bill_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_note_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fiscal_impact: Option<f64>,
    pub bill_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_note_url: Option<String>,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn has_fiscal_note(&self) -> bool {
        self.fiscal_note_summary.is_some()
    }
}

/// Outcome of the fiscal invocation: the narrative always survives, the
/// figure only when it parsed unambiguously.
#[derive(Debug, Clone)]
pub struct FiscalAnalysis {
    pub summary: String,
    pub total: Option<f64>,
}

/// Runs the model invocations for one pipeline execution.
pub struct AnalysisEngine {
    model: Arc<dyn ModelClient>,
}

impl AnalysisEngine {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Summarize the bill text in a few sentences.
    ///
    /// An empty extraction is handled here: the engine answers with an
    /// explicit placeholder instead of invoking the model on nothing.
    pub async fn summarize_bill(
        &self,
        identifier: &BillIdentifier,
        bill_text: &str,
    ) -> Result<String, AnalysisError> {
        if bill_text.trim().is_empty() {
            return Ok(
                "The text of this bill could not be extracted from the published document; \
                 no automated summary is available."
                    .to_string(),
            );
        }
        let excerpt = prefix_chars(bill_text, text_budget(bill_text));
        let prompt = format!(
            "Summarize this Texas legislative bill in 2-3 sentences for a legislator's \
             briefing. State what the bill does, who it affects, and any notable provisions. \
             Use plain, professional language.\n\n\
             Bill {canonical}, session {session}.\n\n\
             Bill text (excerpt):\n{excerpt}",
            canonical = identifier.canonical(),
            session = identifier.session,
        );
        let summary = self
            .model
            .complete(
                CompletionRequest::new(prompt)
                    .with_temperature(0.2)
                    .with_max_tokens(300),
            )
            .await
            .map_err(|error| AnalysisError::ModelUnavailable {
                message: error.to_string(),
            })?;
        info!(bill = %identifier.canonical(), chars = summary.len(), "bill summary generated");
        Ok(summary)
    }

    /// Extract a structured fiscal summary and signed total from note text.
    pub async fn analyze_fiscal_note(
        &self,
        identifier: &BillIdentifier,
        fiscal_text: &str,
    ) -> Result<FiscalAnalysis, AnalysisError> {
        let budget = text_budget(fiscal_text);
        let excerpt = prefix_chars(fiscal_text, budget);
        let prompt = format!(
            "Analyze this Texas legislative fiscal note and provide a comprehensive summary.\n\n\
             Return ONLY valid JSON (no markdown, no code blocks, no explanation):\n\
             {{\n  \"fiscal_note_summary\": \"Your summary here\",\n  \"total_fiscal_impact\": -1234567.89\n}}\n\n\
             SUMMARY REQUIREMENTS (2-3 paragraphs):\n\
             - State the total net fiscal impact (positive for revenue or savings, negative for costs).\n\
             - List amounts for each fiscal year and distinguish one-time from recurring costs.\n\
             - Cover staffing requirements, implementation timeline, and notable assumptions.\n\n\
             TOTAL FISCAL IMPACT RULES:\n\
             - Sum ALL fiscal years mentioned in the note.\n\
             - Use negative numbers for costs and positive numbers for revenue or savings.\n\
             - If no clear total is stated, calculate one from the year-by-year data.\n\n\
             Fiscal note text (first {budget} characters):\n{excerpt}",
        );
        let output = self
            .model
            .complete(CompletionRequest::new(prompt).with_temperature(0.1))
            .await
            .map_err(|error| AnalysisError::ModelUnavailable {
                message: error.to_string(),
            })?;

        let total = fiscal::parse_total(&output);
        let summary = fiscal::extract_summary(&output).unwrap_or_else(|| output.clone());
        if total.is_none() {
            debug!(
                bill = %identifier.canonical(),
                "no unambiguous fiscal total in model output, keeping summary only"
            );
        }
        info!(
            bill = %identifier.canonical(),
            total = ?total,
            "fiscal note analyzed"
        );
        Ok(FiscalAnalysis { summary, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiscal_relevance_gate() {
        assert!(fiscal_note_relevant(
            "This Act makes an APPROPRIATION of three million dollars."
        ));
        assert!(fiscal_note_relevant("relating to the cost of licensure"));
        assert!(!fiscal_note_relevant(
            "relating to the designation of a state holiday"
        ));
        assert!(!fiscal_note_relevant(""));
    }

    #[test]
    fn text_budget_shrinks_for_huge_documents() {
        assert_eq!(text_budget("short"), 5);
        assert_eq!(text_budget(&"x".repeat(20_000)), 10_000);
        assert_eq!(text_budget(&"x".repeat(60_000)), 8_000);
        assert_eq!(text_budget(&"x".repeat(120_000)), 6_000);
        assert_eq!(text_budget(&"x".repeat(200_000)), 4_000);
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(prefix_chars(&text, 3).chars().count(), 3);
        assert_eq!(prefix_chars("abc", 10), "abc");
    }
}
