use std::fmt;

use serde::{Deserialize, Serialize};

/// Text of a single PDF page. Page numbers are 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct PageText {
    pub page_number: usize,
    pub raw_text: String,
}

/// Whether a reference points at a figure or a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    Figure,
    Table,
}

impl FigureKind {
    pub fn label(self) -> &'static str {
        match self {
            FigureKind::Figure => "Figure",
            FigureKind::Table => "Table",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FigureKind::Figure => "figure",
            FigureKind::Table => "table",
        }
    }
}

impl fmt::Display for FigureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A detected, not yet selected reference to a figure or table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureCandidate {
    pub page_number: usize,
    pub kind: FigureKind,
    /// Reference number as written, e.g. "3" or "1a".
    pub number: String,
    pub caption: String,
    /// Byte offset of the defining match within the page text.
    pub match_offset: usize,
    pub importance_score: f64,
}

impl FigureCandidate {
    /// Identity of the logical figure across the whole document.
    pub fn key(&self) -> (FigureKind, &str) {
        (self.kind, self.number.as_str())
    }

    pub fn has_real_caption(&self) -> bool {
        self.caption != fallback_caption(self.kind, &self.number)
    }
}

/// Caption used when no caption text could be parsed: "Figure 3", "Table 1".
pub fn fallback_caption(kind: FigureKind, number: &str) -> String {
    format!("{} {}", kind.label(), number)
}

/// Coarse semantic zone of a paper page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Abstract,
    Introduction,
    Method,
    Conclusion,
    Body,
}

/// Axis-aligned box in page space: PDF points, origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One literal text occurrence. Occurrences wrapping across lines carry one quad per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    pub quads: Vec<Rect>,
}

impl TextRegion {
    pub fn bounds(&self) -> Option<Rect> {
        let mut quads = self.quads.iter();
        let first = *quads.next()?;
        Some(quads.fold(first, |acc, q| acc.union(q)))
    }
}

/// RGB color with components in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb(pub f32, pub f32, pub f32);

/// Highlight category; decides the highlight color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Conclusion,
    Method,
    Relevant,
    Question,
    Quote,
    Background,
    Term,
}

impl HighlightKind {
    /// Unknown tags map to `Background`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "conclusion" => HighlightKind::Conclusion,
            "method" => HighlightKind::Method,
            "relevant" => HighlightKind::Relevant,
            "question" => HighlightKind::Question,
            "quote" => HighlightKind::Quote,
            "term" => HighlightKind::Term,
            _ => HighlightKind::Background,
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            HighlightKind::Conclusion => Rgb(1.0, 1.0, 0.0),
            HighlightKind::Method => Rgb(0.6, 1.0, 0.6),
            HighlightKind::Relevant => Rgb(0.6, 0.8, 1.0),
            HighlightKind::Question => Rgb(1.0, 0.6, 0.6),
            HighlightKind::Quote => Rgb(0.9, 0.7, 1.0),
            HighlightKind::Background => Rgb(1.0, 0.8, 0.5),
            HighlightKind::Term => Rgb(0.7, 0.9, 1.0),
        }
    }
}

/// A caller-supplied annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationRequest {
    /// Empty `text` is a no-op.
    Highlight {
        page_number: usize,
        kind: HighlightKind,
        text: String,
    },
    TextNote {
        page_number: usize,
        position: Point,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

/// Where a note draw-op came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSource {
    Request,
    Glossary,
    AutoNote,
}

/// Renderer-independent instruction to place a highlight or a note on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Highlight {
        page_number: usize,
        kind: HighlightKind,
        region: TextRegion,
        color: Rgb,
    },
    Note {
        page_number: usize,
        source: NoteSource,
        position: Point,
        body: String,
        color: Rgb,
    },
}

/// One selected figure together with its extraction outcome.
///
/// `path` and `message` are always serialized (as `null` when absent) so the
/// schema does not depend on `extractable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub page_number: usize,
    pub kind: FigureKind,
    pub number: String,
    pub caption: String,
    pub importance_score: f64,
    pub extractable: bool,
    pub path: Option<String>,
    pub message: Option<String>,
}

/// An image object embedded in a page, re-encoded for writing to disk.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub byte_size: usize,
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// A character extracted from a PDF page with its box in page space.
#[derive(Debug, Clone)]
pub struct PdfChar {
    pub ch: char,
    pub rect: Rect,
}
