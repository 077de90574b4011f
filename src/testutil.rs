//! In-memory stand-ins for the pdfium collaborator.

use std::collections::{BTreeMap, HashMap};

use crate::error::PdfError;
use crate::pdf::{locate_literal, AnnotationSink, PaperSource};
use crate::types::{EmbeddedImage, PdfChar, Point, Rect, Rgb, TextRegion};

const LEFT_MARGIN: f32 = 72.0;
const TOP_MARGIN: f32 = 72.0;
const CHAR_WIDTH: f32 = 6.0;
const LINE_HEIGHT: f32 = 14.0;
const GLYPH_HEIGHT: f32 = 10.0;

/// Lay text out on a monospace grid, one `PdfChar` per non-newline character.
pub fn layout_chars(text: &str) -> Vec<PdfChar> {
    let mut chars = Vec::new();
    for (line_no, line) in text.split('\n').enumerate() {
        let y0 = TOP_MARGIN + LINE_HEIGHT * line_no as f32;
        for (col, ch) in line.chars().enumerate() {
            let x0 = LEFT_MARGIN + CHAR_WIDTH * col as f32;
            chars.push(PdfChar {
                ch,
                rect: Rect {
                    x0,
                    y0,
                    x1: x0 + CHAR_WIDTH,
                    y1: y0 + GLYPH_HEIGHT,
                },
            });
        }
    }
    chars
}

#[derive(Default)]
pub struct FakePaper {
    pub pages: Vec<String>,
    pub images: HashMap<usize, Vec<EmbeddedImage>>,
    pub render_fails: bool,
    /// Page whose text and search calls fail, as a broken content stream would.
    pub text_fails_on: Option<usize>,
}

impl FakePaper {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, page_number: usize, byte_size: usize) -> Self {
        self.images.entry(page_number).or_default().push(EmbeddedImage {
            byte_size,
            bytes: vec![7; byte_size],
            extension: "png".to_string(),
        });
        self
    }

    fn page(&self, page_number: usize) -> Result<&str, PdfError> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(String::as_str)
            .ok_or(PdfError::PageOutOfRange {
                page: page_number,
                total: self.pages.len(),
            })
    }

    fn text_of(&self, page_number: usize) -> Result<&str, PdfError> {
        if self.text_fails_on == Some(page_number) {
            return Err(PdfError::Pdfium {
                page: page_number,
                detail: "text page unavailable".to_string(),
            });
        }
        self.page(page_number)
    }
}

impl PaperSource for FakePaper {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page_number: usize) -> Result<String, PdfError> {
        self.text_of(page_number).map(str::to_string)
    }

    fn search_literal(
        &self,
        page_number: usize,
        needle: &str,
    ) -> Result<Vec<TextRegion>, PdfError> {
        let text = self.text_of(page_number)?;
        Ok(locate_literal(&layout_chars(text), needle))
    }

    fn embedded_images(&self, page_number: usize) -> Result<Vec<EmbeddedImage>, PdfError> {
        self.page(page_number)?;
        Ok(self.images.get(&page_number).cloned().unwrap_or_default())
    }

    fn render_page(&self, page_number: usize, _scale: f32) -> Result<Vec<u8>, PdfError> {
        self.page(page_number)?;
        if self.render_fails {
            return Err(PdfError::Pdfium {
                page: page_number,
                detail: "render failed".to_string(),
            });
        }
        Ok(b"\x89PNG fake page".to_vec())
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("title".to_string(), "A Fake Paper".to_string())])
    }
}

/// Records draw calls as readable strings.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Vec<String>,
}

impl AnnotationSink for RecordingSink {
    fn draw_highlight(
        &mut self,
        page_number: usize,
        region: &TextRegion,
        _color: Rgb,
    ) -> Result<(), PdfError> {
        self.calls
            .push(format!("highlight p{page_number} quads={}", region.quads.len()));
        Ok(())
    }

    fn draw_text_note(
        &mut self,
        page_number: usize,
        position: Point,
        body: &str,
        _color: Rgb,
    ) -> Result<(), PdfError> {
        self.calls.push(format!(
            "note p{page_number} ({}, {}) {body}",
            position.x, position.y
        ));
        Ok(())
    }
}
