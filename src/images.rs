use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::pdf::PaperSource;
use crate::types::{FigureCandidate, ManifestEntry};

/// Images at or below this size are placeholders, icons or 1×1 spacers.
pub const MIN_IMAGE_BYTES: usize = 1024;

/// Scale used when a whole page is rendered in place of a figure.
pub const PAGE_RENDER_SCALE: f32 = 2.0;

/// Outcome of trying to get a standalone image for one figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: Option<PathBuf>,
    pub extractable: bool,
    pub message: Option<String>,
}

/// Writes figure images into an output directory.
pub struct ImageResolver {
    out_dir: PathBuf,
    render_fallback: bool,
}

impl ImageResolver {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            render_fallback: true,
        }
    }

    /// Whether to render the whole page when no standalone image exists.
    pub fn with_render_fallback(mut self, enabled: bool) -> Self {
        self.render_fallback = enabled;
        self
    }

    /// Never fails: every problem ends up as `extractable: false` plus a
    /// message naming the page to look at.
    pub fn resolve(&self, candidate: &FigureCandidate, source: &dyn PaperSource) -> Resolution {
        let page = candidate.page_number;
        let reason = match source.embedded_images(page) {
            Ok(images) => match images.into_iter().max_by_key(|img| img.byte_size) {
                Some(img) if img.byte_size > MIN_IMAGE_BYTES => {
                    let name = format!(
                        "{}_{}_p{}.{}",
                        candidate.kind.as_str(),
                        sanitize(&candidate.number),
                        page,
                        img.extension
                    );
                    match self.write(&name, &img.bytes) {
                        Ok(path) => {
                            debug!("Extracted {} {} to {}", candidate.kind, candidate.number, path.display());
                            return Resolution {
                                path: Some(path),
                                extractable: true,
                                message: None,
                            };
                        }
                        Err(e) => format!("writing the image failed ({e})"),
                    }
                }
                Some(img) => format!(
                    "the largest embedded image on page {page} is only {} bytes",
                    img.byte_size
                ),
                None => format!("page {page} has no embedded images (likely a vector figure)"),
            },
            Err(e) => format!("reading images from page {page} failed ({e})"),
        };

        let message = format!(
            "{} {} could not be extracted as a standalone image: {reason}. See page {page} of the PDF.",
            candidate.kind, candidate.number
        );
        info!("{message}");
        Resolution {
            path: self.render_page_fallback(page, source),
            extractable: false,
            message: Some(message),
        }
    }

    fn render_page_fallback(&self, page: usize, source: &dyn PaperSource) -> Option<PathBuf> {
        if !self.render_fallback {
            return None;
        }
        // Always re-rendered: a shared output directory may hold another paper's page.
        let name = format!("page_{page}.png");
        let bytes = source
            .render_page(page, PAGE_RENDER_SCALE)
            .map_err(|e| warn!("Page render fallback failed: {e}"))
            .ok()?;
        self.write(&name, &bytes)
            .map_err(|e| warn!("Writing page render failed: {e}"))
            .ok()
    }

    fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Resolve every selected figure, in selection order. Unextractable
/// figures are kept in the manifest.
pub fn build_manifest(
    selected: &[FigureCandidate],
    source: &dyn PaperSource,
    resolver: &ImageResolver,
) -> Vec<ManifestEntry> {
    selected
        .iter()
        .map(|candidate| {
            let resolution = resolver.resolve(candidate, source);
            ManifestEntry {
                page_number: candidate.page_number,
                kind: candidate.kind,
                number: candidate.number.clone(),
                caption: candidate.caption.clone(),
                importance_score: candidate.importance_score,
                extractable: resolution.extractable,
                path: resolution.path.map(|p| p.display().to_string()),
                message: resolution.message,
            }
        })
        .collect()
}

/// Default figure directory: `<pdf dir>/<pdf stem>_figures`.
pub fn default_output_dir(pdf_path: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paper".to_string());
    pdf_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_figures"))
}

fn sanitize(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
