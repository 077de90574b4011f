use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PdfError;
use crate::pdf::PaperSource;
use crate::strategy::ReadingPurpose;
use crate::types::{ManifestEntry, PageText};

/// Leading pages a quick scan always reads.
const QUICK_SCAN_HEAD: usize = 3;
/// Trailing pages a quick scan always reads.
const QUICK_SCAN_TAIL: usize = 2;

/// Everything the `content` command reports for one paper.
#[derive(Debug, Serialize)]
pub struct ContentReport {
    pub text: Vec<PageText>,
    /// Empty when figure extraction was skipped.
    pub figures: Vec<ManifestEntry>,
    pub metadata: Map<String, Value>,
}

/// Pages worth reading for a purpose, ascending.
///
/// A quick scan reads the first three pages and the last two; every other
/// purpose reads the whole paper.
pub fn pages_for_purpose(purpose: ReadingPurpose, total_pages: usize) -> Vec<usize> {
    if purpose != ReadingPurpose::QuickScan || total_pages <= QUICK_SCAN_HEAD {
        return (1..=total_pages).collect();
    }
    let tail_start = (total_pages + 1 - QUICK_SCAN_TAIL).max(QUICK_SCAN_HEAD + 1);
    (1..=QUICK_SCAN_HEAD).chain(tail_start..=total_pages).collect()
}

/// Parse `"3"` or `"1-5"` into page numbers, clamped to the document.
///
/// Anything unusable (garbage, reversed bounds, a range past the last page)
/// falls back to the purpose's page set.
pub fn parse_page_range(range: &str, total_pages: usize, purpose: ReadingPurpose) -> Vec<usize> {
    match parse_bounds(range) {
        Some((start, end)) if start <= end && start <= total_pages => {
            (start..=end.min(total_pages)).collect()
        }
        _ => {
            warn!("Ignoring page range '{range}', using pages for '{}'", purpose.key());
            pages_for_purpose(purpose, total_pages)
        }
    }
}

fn parse_bounds(range: &str) -> Option<(usize, usize)> {
    let range = range.trim();
    let (start, end): (usize, usize) = match range.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let page: usize = range.parse().ok()?;
            (page, page)
        }
    };
    Some((start.max(1), end))
}

/// Text of exactly the listed pages, in the order given.
pub fn extract_text(source: &dyn PaperSource, pages: &[usize]) -> Result<Vec<PageText>, PdfError> {
    let text = pages
        .iter()
        .map(|&page_number| {
            Ok(PageText {
                page_number,
                raw_text: source.page_text(page_number)?,
            })
        })
        .collect::<Result<Vec<_>, PdfError>>()?;
    debug!("Extracted text from {} pages", text.len());
    Ok(text)
}

/// Text of every page.
pub fn extract_all_text(source: &dyn PaperSource) -> Result<Vec<PageText>, PdfError> {
    let pages: Vec<usize> = (1..=source.page_count()).collect();
    extract_text(source, &pages)
}

/// Standard document fields plus `total_pages` and `filename`.
pub fn document_metadata(source: &dyn PaperSource, pdf_path: &Path) -> Map<String, Value> {
    let mut metadata: Map<String, Value> = source
        .metadata()
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    metadata.insert("total_pages".to_string(), Value::from(source.page_count()));
    let filename = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    metadata.insert("filename".to_string(), Value::String(filename));
    metadata
}
