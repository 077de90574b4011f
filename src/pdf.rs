use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::PdfError;
use crate::types::{EmbeddedImage, PdfChar, Point, Rect, Rgb, TextRegion};

/// Side length of a note icon, in points.
const NOTE_ICON_SIZE: f32 = 20.0;

/// Read access to a PDF. Page numbers are 1-based; positions use a top-left origin.
pub trait PaperSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, page_number: usize) -> Result<String, PdfError>;
    /// Literal occurrences of `needle` on a page. No hits is an empty list.
    fn search_literal(&self, page_number: usize, needle: &str)
    -> Result<Vec<TextRegion>, PdfError>;
    fn embedded_images(&self, page_number: usize) -> Result<Vec<EmbeddedImage>, PdfError>;
    /// Whole page as PNG bytes.
    fn render_page(&self, page_number: usize, scale: f32) -> Result<Vec<u8>, PdfError>;
    fn metadata(&self) -> BTreeMap<String, String>;
}

/// Write access: places annotations on pages.
pub trait AnnotationSink {
    fn draw_highlight(
        &mut self,
        page_number: usize,
        region: &TextRegion,
        color: Rgb,
    ) -> Result<(), PdfError>;
    fn draw_text_note(
        &mut self,
        page_number: usize,
        position: Point,
        body: &str,
        color: Rgb,
    ) -> Result<(), PdfError>;
}

/// A PDF opened through pdfium.
pub struct PaperPdf<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
}

impl<'a> PaperPdf<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, PdfError> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Open {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;
        let page_count = document.pages().len() as usize;
        debug!("Opened {} ({page_count} pages)", path.display());
        Ok(Self {
            document,
            page_count,
        })
    }

    /// Write the document to `path` via a temporary sibling, so a failed
    /// save leaves no partial output behind.
    pub fn save(&self, path: &Path) -> Result<(), PdfError> {
        let bytes = self.document.save_to_bytes().map_err(|e| PdfError::Save {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;
        let tmp = temp_sibling(path);
        std::fs::write(&tmp, bytes).map_err(|source| PdfError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            PdfError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn page_index(&self, page_number: usize) -> Result<u16, PdfError> {
        if page_number == 0 || page_number > self.page_count {
            return Err(PdfError::PageOutOfRange {
                page: page_number,
                total: self.page_count,
            });
        }
        Ok((page_number - 1) as u16)
    }

    /// Characters of one page with boxes in top-left page space.
    pub fn page_chars(&self, page_number: usize) -> Result<Vec<PdfChar>, PdfError> {
        let index = self.page_index(page_number)?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;
        let page_height = page.height().value;
        let text_page = page.text().map_err(pdfium_err(page_number))?;
        Ok(text_page
            .chars()
            .iter()
            .filter_map(|ch| convert_text_char(&ch, page_height))
            .collect())
    }
}

impl PaperSource for PaperPdf<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page_number: usize) -> Result<String, PdfError> {
        let index = self.page_index(page_number)?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;
        let text_page = page.text().map_err(pdfium_err(page_number))?;
        Ok(text_page.all())
    }

    fn search_literal(
        &self,
        page_number: usize,
        needle: &str,
    ) -> Result<Vec<TextRegion>, PdfError> {
        let chars = self.page_chars(page_number)?;
        Ok(locate_literal(&chars, needle))
    }

    fn embedded_images(&self, page_number: usize) -> Result<Vec<EmbeddedImage>, PdfError> {
        let index = self.page_index(page_number)?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;

        let mut images = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let decoded = match image_object.get_raw_image() {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping undecodable image on page {page_number}: {e:?}");
                    continue;
                }
            };
            match encode_png(&decoded, page_number) {
                Ok(bytes) => images.push(EmbeddedImage {
                    byte_size: bytes.len(),
                    bytes,
                    extension: "png".to_string(),
                }),
                Err(e) => warn!("{e}"),
            }
        }
        debug!("Page {page_number}: {} embedded images", images.len());
        Ok(images)
    }

    fn render_page(&self, page_number: usize, scale: f32) -> Result<Vec<u8>, PdfError> {
        let index = self.page_index(page_number)?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(pdfium_err(page_number))?;
        encode_png(&bitmap.as_image(), page_number)
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        let metadata = self.document.metadata();
        let fields = [
            ("title", PdfDocumentMetadataTagType::Title),
            ("author", PdfDocumentMetadataTagType::Author),
            ("subject", PdfDocumentMetadataTagType::Subject),
            ("keywords", PdfDocumentMetadataTagType::Keywords),
            ("creator", PdfDocumentMetadataTagType::Creator),
            ("producer", PdfDocumentMetadataTagType::Producer),
        ];
        fields
            .into_iter()
            .filter_map(|(key, tag)| {
                let value = metadata.get(tag)?.value().trim().to_string();
                (!value.is_empty()).then(|| (key.to_string(), value))
            })
            .collect()
    }
}

impl AnnotationSink for PaperPdf<'_> {
    fn draw_highlight(
        &mut self,
        page_number: usize,
        region: &TextRegion,
        color: Rgb,
    ) -> Result<(), PdfError> {
        let Some(bounds) = region.bounds() else {
            return Ok(());
        };
        let index = self.page_index(page_number)?;
        let mut page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;
        let page_height = page.height().value;

        let mut annotation = page
            .annotations_mut()
            .create_highlight_annotation()
            .map_err(pdfium_err(page_number))?;
        annotation
            .set_bounds(to_pdf_rect(&bounds, page_height))
            .map_err(pdfium_err(page_number))?;
        for quad in &region.quads {
            annotation
                .attachment_points_mut()
                .create_attachment_point_at_end(PdfQuadPoints::from_rect(&to_pdf_rect(
                    quad,
                    page_height,
                )))
                .map_err(pdfium_err(page_number))?;
        }
        annotation
            .set_stroke_color(to_pdf_color(color))
            .map_err(pdfium_err(page_number))?;
        Ok(())
    }

    fn draw_text_note(
        &mut self,
        page_number: usize,
        position: Point,
        body: &str,
        color: Rgb,
    ) -> Result<(), PdfError> {
        let index = self.page_index(page_number)?;
        let mut page = self
            .document
            .pages()
            .get(index)
            .map_err(pdfium_err(page_number))?;
        let page_height = page.height().value;

        let icon = Rect {
            x0: position.x,
            y0: position.y,
            x1: position.x + NOTE_ICON_SIZE,
            y1: position.y + NOTE_ICON_SIZE,
        };
        let mut annotation = page
            .annotations_mut()
            .create_text_annotation(body)
            .map_err(pdfium_err(page_number))?;
        annotation
            .set_bounds(to_pdf_rect(&icon, page_height))
            .map_err(pdfium_err(page_number))?;
        annotation
            .set_stroke_color(to_pdf_color(color))
            .map_err(pdfium_err(page_number))?;
        Ok(())
    }
}

fn pdfium_err(page: usize) -> impl Fn(PdfiumError) -> PdfError {
    move |e| PdfError::Pdfium {
        page,
        detail: format!("{e:?}"),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn convert_text_char(ch: &PdfPageTextChar, page_height: f32) -> Option<PdfChar> {
    let unicode = ch.unicode_char()?;
    if unicode.is_control() {
        return None;
    }

    // Zero-size glyphs are watermarks or hidden text
    if ch.scaled_font_size().value < 0.5 {
        return None;
    }

    let bounds = ch.loose_bounds().or_else(|_| ch.tight_bounds()).ok()?;
    Some(PdfChar {
        ch: unicode,
        rect: Rect {
            x0: bounds.left().value,
            y0: page_height - bounds.top().value,
            x1: bounds.right().value,
            y1: page_height - bounds.bottom().value,
        },
    })
}

/// Top-left page space to pdfium's bottom-left space.
fn to_pdf_rect(rect: &Rect, page_height: f32) -> PdfRect {
    PdfRect::new_from_values(
        page_height - rect.y1,
        rect.x0,
        page_height - rect.y0,
        rect.x1,
    )
}

fn to_pdf_color(color: Rgb) -> PdfColor {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    PdfColor::new(channel(color.0), channel(color.1), channel(color.2), 255)
}

fn encode_png(image: &DynamicImage, page_number: usize) -> Result<Vec<u8>, PdfError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| PdfError::Image {
            page: page_number,
            detail: e.to_string(),
        })?;
    Ok(buf.into_inner())
}

/// Find literal occurrences of `needle` in a page's characters.
///
/// Case-sensitive. Any whitespace run, and any jump to a new line, counts as
/// a single space on both sides, so a phrase wrapped across lines still
/// matches. Matches do not overlap.
pub fn locate_literal(chars: &[PdfChar], needle: &str) -> Vec<TextRegion> {
    let needle: Vec<char> = needle
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let (flat, origin) = flatten_chars(chars);
    let mut regions = Vec::new();
    let mut start = 0;
    while start + needle.len() <= flat.len() {
        let end = start + needle.len();
        if flat[start..end] == needle[..] {
            regions.push(region_for(chars, &origin[start..end]));
            start = end;
        } else {
            start += 1;
        }
    }
    regions
}

/// Flatten characters into a searchable sequence. `origin[i]` is the index
/// into `chars` for real characters and `None` for synthesized spaces.
fn flatten_chars(chars: &[PdfChar]) -> (Vec<char>, Vec<Option<usize>>) {
    let mut flat = Vec::with_capacity(chars.len());
    let mut origin = Vec::with_capacity(chars.len());
    let mut prev: Option<&PdfChar> = None;
    let mut pending_space = false;

    for (i, pc) in chars.iter().enumerate() {
        if pc.ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if let Some(p) = prev
            && !same_line(p, pc)
        {
            pending_space = true;
        }
        if pending_space && !flat.is_empty() {
            flat.push(' ');
            origin.push(None);
        }
        pending_space = false;
        flat.push(pc.ch);
        origin.push(Some(i));
        prev = Some(pc);
    }
    (flat, origin)
}

fn region_for(chars: &[PdfChar], origin: &[Option<usize>]) -> TextRegion {
    let mut quads: Vec<Rect> = Vec::new();
    let mut line_anchor: Option<&PdfChar> = None;
    for &i in origin.iter().flatten() {
        let pc = &chars[i];
        let continues_line = line_anchor.is_some_and(|anchor| same_line(anchor, pc));
        if continues_line && let Some(last) = quads.last_mut() {
            *last = last.union(&pc.rect);
        } else {
            quads.push(pc.rect);
            line_anchor = Some(pc);
        }
    }
    TextRegion { quads }
}

/// Two characters share a line when their bottoms are within half a glyph height.
fn same_line(a: &PdfChar, b: &PdfChar) -> bool {
    let tolerance = (a.rect.height().max(b.rect.height()) * 0.5).max(1.0);
    (a.rect.y1 - b.rect.y1).abs() <= tolerance
}
