//! Canonical bill identifiers and the normalizer that produces them.
//!
//! Users refer to bills in many forms: `"HB150"`, `"hb 150"`, `"H.B. 150"`,
//! `"House Bill 150"`, `"SJR 12"`. All of them normalize to one canonical
//! [`BillIdentifier`], and everything downstream (URL derivation, caching,
//! request deduplication) keys off the canonical form, never the raw input.
//!
//! # Examples
//!
//! ```
//! use billscope::identifier::BillIdentifier;
//!
//! let a = BillIdentifier::parse("hb 150", "89R").unwrap();
//! let b = BillIdentifier::parse("House Bill 150", "89R").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.canonical(), "HB00150");
//! assert_eq!(a.cache_key(), "HB00150@89R");
//! ```

use std::fmt;
use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Legislative chamber a bill originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn letter(&self) -> char {
        match self {
            Chamber::House => 'H',
            Chamber::Senate => 'S',
        }
    }
}

/// Kind of legislative instrument.
///
/// Simple resolutions (`HR`/`SR`) are deliberately not modeled; the pipeline
/// handles bills and joint resolutions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BillKind {
    Bill,
    JointResolution,
}

impl BillKind {
    pub fn letter(&self) -> char {
        match self {
            BillKind::Bill => 'B',
            BillKind::JointResolution => 'J',
        }
    }
}

/// Canonical reference to a piece of Texas legislation.
///
/// Immutable once parsed. Equality, hashing, and cache keys all use the
/// canonical zero-padded form, so `"hb 150"` and `"House Bill 150"` are the
/// same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BillIdentifier {
    pub chamber: Chamber,
    pub kind: BillKind,
    pub number: u32,
    pub session: String,
}

/// Errors produced while normalizing a raw bill reference.
///
/// These always surface to the caller and are never retried.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("empty bill reference")]
    #[diagnostic(
        code(billscope::identifier::empty),
        help("Provide a bill reference such as \"HB 150\".")
    )]
    Empty,

    #[error("unrecognized bill reference: {input:?}")]
    #[diagnostic(
        code(billscope::identifier::unrecognized),
        help("Recognized forms include \"HB 150\", \"Senate Bill 12\", and \"HJR 15\".")
    )]
    Unrecognized { input: String },

    #[error("bill number {number} is out of range")]
    #[diagnostic(
        code(billscope::identifier::number_out_of_range),
        help("Bill numbers are between 1 and 99999.")
    )]
    NumberOutOfRange { number: u64 },
}

static BILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(HOUSE|SENATE|H|S)[\s.\-]*(JOINT[\s.\-]*RESOLUTION|BILL|JR|J|B)[\s.\-]*(?:NO\.?[\s.\-]*)?([0-9]{1,6})(?:[\s,.\-()]+([0-9]{2}(?:R|S[0-9])))?[\s.)]*$",
    )
    .expect("bill reference pattern is valid")
});

impl BillIdentifier {
    /// Normalize a free-form bill reference.
    ///
    /// `default_session` is applied when the input does not carry its own
    /// session token (e.g. `"HB 150 (89R)"` overrides it). Deterministic and
    /// side-effect free.
    pub fn parse(input: &str, default_session: &str) -> Result<Self, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let caps = BILL_RE
            .captures(input)
            .ok_or_else(|| ParseError::Unrecognized {
                input: input.to_string(),
            })?;

        let chamber = match caps[1].to_uppercase().chars().next() {
            Some('H') => Chamber::House,
            _ => Chamber::Senate,
        };
        let kind = match caps[2].to_uppercase().chars().next() {
            Some('J') => BillKind::JointResolution,
            _ => BillKind::Bill,
        };
        let number: u64 = caps[3].parse().map_err(|_| ParseError::Unrecognized {
            input: input.to_string(),
        })?;
        if number == 0 || number > 99_999 {
            return Err(ParseError::NumberOutOfRange { number });
        }
        let session = caps
            .get(4)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| default_session.to_string());

        Ok(Self {
            chamber,
            kind,
            number: number as u32,
            session,
        })
    }

    /// Two-letter type code used by the publishing site, e.g. `"HB"`, `"SJ"`.
    pub fn type_code(&self) -> String {
        format!("{}{}", self.chamber.letter(), self.kind.letter())
    }

    /// Zero-padded five-digit bill number, e.g. `"00150"`.
    pub fn padded_number(&self) -> String {
        format!("{:05}", self.number)
    }

    /// Canonical string form, e.g. `"HB00150"`.
    pub fn canonical(&self) -> String {
        format!("{}{}", self.type_code(), self.padded_number())
    }

    /// Cache and in-flight key: canonical form qualified by session.
    pub fn cache_key(&self) -> String {
        format!("{}@{}", self.canonical(), self.session)
    }
}

impl fmt::Display for BillIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.canonical(), self.session)
    }
}
