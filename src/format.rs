//! Rendering of analysis results for the two consumer shapes.
//!
//! Formatting never fails: absent optional fields degrade to explicit
//! placeholder lines in the text shape and to `null` in the structured
//! shape, never to silent omission.

use serde_json::{json, Value};

use crate::analysis::AnalysisResult;
use crate::error::ErrorKind;

/// Render the fixed natural-language block.
pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Bill {} (Session {})\n\n",
        result.identifier.canonical(),
        result.identifier.session
    ));

    out.push_str("Summary:\n");
    out.push_str(result.bill_summary.trim());
    out.push_str("\n\n");

    out.push_str("Fiscal Impact:\n");
    match (&result.fiscal_note_summary, result.total_fiscal_impact) {
        (Some(summary), Some(total)) => {
            out.push_str(&format!(
                "Estimated total impact: {}\n",
                format_currency(total)
            ));
            out.push_str(summary.trim());
            out.push('\n');
        }
        (Some(summary), None) => {
            out.push_str("A fiscal note exists, but no single total could be determined.\n");
            out.push_str(summary.trim());
            out.push('\n');
        }
        _ => {
            out.push_str("No fiscal note is available for this bill.\n");
        }
    }
    out.push('\n');

    out.push_str("Sources:\n");
    out.push_str(&format!("Bill text: {}\n", result.bill_url));
    if let Some(url) = &result.fiscal_note_url {
        out.push_str(&format!("Fiscal note: {}\n", url));
    }
    out.push('\n');

    out.push_str("Would you like me to look up another bill?");
    out
}

/// Render the structured shape: every field verbatim, `success: true`.
pub fn render_structured(result: &AnalysisResult) -> Value {
    json!({
        "success": true,
        "bill_number": result.identifier.canonical(),
        "session": result.identifier.session,
        "bill_summary": result.bill_summary,
        "fiscal_note_summary": result.fiscal_note_summary,
        "total_fiscal_impact": result.total_fiscal_impact,
        "has_fiscal_note": result.has_fiscal_note(),
        "bill_url": result.bill_url,
        "fiscal_note_url": result.fiscal_note_url,
        "computed_at": result.computed_at.to_rfc3339(),
    })
}

/// Render a failure as a well-formed structured reply.
pub fn render_failure(kind: ErrorKind, message: &str) -> Value {
    json!({
        "success": false,
        "error": message,
        "error_kind": kind,
    })
}

/// Format a signed dollar amount with thousands grouping and cents.
pub fn format_currency(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u128;
    let dollars = cents / 100;
    let rem = cents % 100;

    let digits: Vec<char> = dollars.to_string().chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, rem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::identifier::BillIdentifier;

    fn base_result() -> AnalysisResult {
        AnalysisResult {
            identifier: BillIdentifier::parse("HB 103", "89R").unwrap(),
            bill_summary: "Creates a grant program.".into(),
            fiscal_note_summary: None,
            total_fiscal_impact: None,
            bill_url: "https://example.com/hb103.pdf".into(),
            fiscal_note_url: None,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(-1_525_000.0), "-$1,525,000.00");
        assert_eq!(format_currency(2_300_000_000.0), "$2,300,000,000.00");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(-42.5), "-$42.50");
        assert_eq!(format_currency(999.0), "$999.00");
    }

    #[test]
    fn text_shape_without_fiscal_note() {
        let text = render_text(&base_result());
        assert!(text.starts_with("Bill HB00103 (Session 89R)"));
        assert!(text.contains("No fiscal note is available for this bill."));
        assert!(text.contains("Bill text: https://example.com/hb103.pdf"));
        assert!(!text.contains("Fiscal note:"));
        assert!(text.ends_with("Would you like me to look up another bill?"));
    }

    #[test]
    fn text_shape_with_fiscal_note() {
        let mut result = base_result();
        result.fiscal_note_summary = Some("Costs about $1.5 million over the biennium.".into());
        result.total_fiscal_impact = Some(-1_525_000.0);
        result.fiscal_note_url = Some("https://example.com/hb103-fnote.pdf".into());
        let text = render_text(&result);
        assert!(text.contains("Estimated total impact: -$1,525,000.00"));
        assert!(text.contains("Fiscal note: https://example.com/hb103-fnote.pdf"));
    }

    #[test]
    fn text_shape_with_ambiguous_total() {
        let mut result = base_result();
        result.fiscal_note_summary = Some("Impact varies by year.".into());
        result.fiscal_note_url = Some("https://example.com/hb103-fnote.pdf".into());
        let text = render_text(&result);
        assert!(text.contains("no single total could be determined"));
        assert!(text.contains("Impact varies by year."));
    }

    #[test]
    fn structured_shape_is_verbatim() {
        let mut result = base_result();
        result.total_fiscal_impact = Some(-1_525_000.0);
        result.fiscal_note_summary = Some("Costs.".into());
        let value = render_structured(&result);
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["bill_number"], json!("HB00103"));
        assert_eq!(value["session"], json!("89R"));
        assert_eq!(value["total_fiscal_impact"], json!(-1_525_000.0));
        assert_eq!(value["has_fiscal_note"], json!(true));
        assert_eq!(value["fiscal_note_url"], Value::Null);
    }

    #[test]
    fn failure_shape_is_well_formed() {
        let value = render_failure(ErrorKind::BillNotFound, "Bill HB99999 could not be found.");
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error_kind"], json!("bill_not_found"));
        assert!(value["error"].as_str().unwrap().contains("HB99999"));
    }
}
