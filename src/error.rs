//! Failures of the PDF collaborator.
//!
//! These abort the document-level operation in progress. A single figure that
//! cannot be extracted is not an error; it is reported in the manifest.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF '{path}': {detail}")]
    Open { path: PathBuf, detail: String },

    #[error("Failed to save PDF '{path}': {detail}")]
    Save { path: PathBuf, detail: String },

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("pdfium failed on page {page}: {detail}")]
    Pdfium { page: usize, detail: String },

    #[error("Failed to encode image from page {page}: {detail}")]
    Image { page: usize, detail: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
