//! Deterministic extraction of a signed monetary total from model output.
//!
//! The fiscal invocation asks the model for a JSON object, but free-form
//! narrative (with or without markdown fences) comes back often enough that
//! parsing has to handle both. The policy lives here, isolated and pure, so
//! the ambiguity handling can be unit-tested without ever invoking a model:
//! JSON first, then a narrative scan that prefers amounts on bottom-line
//! lines and otherwise only accepts an unambiguous single figure.

use std::sync::LazyLock;

use regex::Regex;

/// Extract the total fiscal impact from raw model output.
///
/// Returns `None` when no figure can be determined unambiguously; the caller
/// treats that as a degraded result, never a failure.
///
/// # Examples
///
/// ```
/// use billscope::analysis::fiscal::parse_total;
///
/// assert_eq!(parse_total("Total net impact: -$1,525,000 over the biennium."), Some(-1_525_000.0));
/// assert_eq!(parse_total("No fiscal implication to the State is anticipated."), None);
/// ```
pub fn parse_total(output: &str) -> Option<f64> {
    if let Some(value) = json_total(output) {
        return Some(value);
    }
    scan_narrative(output)
}

/// Pull the summary string out of a JSON-shaped reply, if there is one.
pub fn extract_summary(output: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fences(output.trim())).ok()?;
    value
        .get("fiscal_note_summary")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn json_total(output: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fences(output.trim())).ok()?;
    value.get("total_fiscal_impact")?.as_f64()
}

/// Drop a surrounding markdown code fence, tolerating a `json` info string.
fn strip_code_fences(output: &str) -> &str {
    let trimmed = output.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed.trim_start_matches("```").trim_end_matches("```");
    inner.trim_start_matches("json").trim()
}

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<paren>\()?(?P<neg>-)?\s*\$\s*(?P<neg2>-)?(?P<num>[0-9][0-9,]*(?:\.[0-9]+)?)(?:\s*(?P<mag>million|billion|[mb]n?)\b)?(?P<close>\))?",
    )
    .expect("amount pattern is valid")
});

fn scan_narrative(output: &str) -> Option<f64> {
    // A line that states the bottom line wins outright.
    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("total") || lower.contains("net impact") || lower.contains("net fiscal") {
            if let Some(value) = amounts_in(line).into_iter().next() {
                return Some(value);
            }
        }
    }
    // Otherwise only an unambiguous figure counts.
    let amounts = amounts_in(output);
    match amounts.as_slice() {
        [] => None,
        [first, rest @ ..] if rest.iter().all(|a| a == first) => Some(*first),
        _ => None,
    }
}

fn amounts_in(text: &str) -> Vec<f64> {
    AMOUNT_RE
        .captures_iter(text)
        .filter_map(|caps| parse_amount(&caps))
        .collect()
}

fn parse_amount(caps: &regex::Captures<'_>) -> Option<f64> {
    let digits = caps.name("num")?.as_str().replace(',', "");
    let mut value: f64 = digits.parse().ok()?;
    if let Some(mag) = caps.name("mag") {
        match mag.as_str().to_lowercase().as_str() {
            "million" | "m" | "mn" => value *= 1_000_000.0,
            "billion" | "b" | "bn" => value *= 1_000_000_000.0,
            _ => {}
        }
    }
    let negative = caps.name("neg").is_some()
        || caps.name("neg2").is_some()
        || (caps.name("paren").is_some() && caps.name("close").is_some());
    Some(if negative { -value } else { value })
}
