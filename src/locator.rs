//! Candidate-URL derivation for the legislature's publishing site.
//!
//! The site's path conventions are inconsistent across sessions and document
//! types, so instead of a single hardcoded URL each document gets an ordered
//! list of template expansions, most likely first. No network I/O happens
//! here; the [`fetcher`](crate::fetcher) walks the candidates in order, which
//! keeps the fallback logic declarative and testable offline.

use std::fmt;

use crate::identifier::BillIdentifier;

/// Default base URL of the publishing site.
pub const DEFAULT_BASE_URL: &str = "https://www.telicon.com/www/TX";

/// Which document of a bill is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    BillText,
    FiscalNote,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::BillText => write!(f, "bill text"),
            DocumentKind::FiscalNote => write!(f, "fiscal note"),
        }
    }
}

/// A document to retrieve, with its fallback URLs.
///
/// `resolved_url`, once set by the fetcher, is always a member of
/// `candidate_urls` that answered a successful probe, and stays fixed for the
/// lifetime of the reference. `content_length` carries the probe's size hint
/// when the server provided one.
#[derive(Debug, Clone)]
pub struct DocumentReference {
    pub identifier: BillIdentifier,
    pub kind: DocumentKind,
    pub candidate_urls: Vec<String>,
    pub resolved_url: Option<String>,
    pub content_length: Option<u64>,
}

impl DocumentReference {
    pub fn new(identifier: BillIdentifier, kind: DocumentKind, base_url: &str) -> Self {
        let candidate_urls = candidate_urls(&identifier, kind, base_url);
        Self {
            identifier,
            kind,
            candidate_urls,
            resolved_url: None,
            content_length: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_url.is_some()
    }
}

/// Expand the known URL templates for `identifier`, most specific first.
pub fn candidate_urls(
    identifier: &BillIdentifier,
    kind: DocumentKind,
    base_url: &str,
) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let session = &identifier.session;
    let code = identifier.type_code();
    let num = identifier.padded_number();

    match kind {
        DocumentKind::BillText => vec![
            format!("{base}/{session}/pdf/TX{session}{code}{num}FIL.pdf"),
            format!("{base}/{session}/pdf/{code}{num}FIL.pdf"),
            format!("{base}/{session}/bills/TX{session}{code}{num}.pdf"),
            format!("{base}/bills/{session}/{code}{num}.pdf"),
        ],
        DocumentKind::FiscalNote => vec![
            format!("{base}/{session}/fnote/TX{session}{code}{num}FIL.pdf"),
            format!("{base}/{session}/fnote/{code}{num}FIL.pdf"),
            format!("{base}/{session}/fiscal/{code}{num}.pdf"),
        ],
    }
}
