mod annotate;
mod collect;
mod content;
mod error;
mod images;
mod kb;
mod markers;
mod pdf;
mod regions;
mod scoring;
mod strategy;
mod types;

#[cfg(test)]
mod testutil;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pdfium_render::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use annotate::{AutoNotes, MergeOptions, NoteLayout};
use content::ContentReport;
use images::ImageResolver;
use kb::Glossary;
use pdf::{PaperPdf, PaperSource};
use strategy::ReadingPurpose;
use types::{ManifestEntry, PageText};

#[derive(Parser)]
#[command(name = "paperlens", about = "Pick key figures from research papers and annotate them")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Override pdfium library path
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_path: Option<String>,

    /// More logging on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Select the most important figures and tables and extract their images
    Figures {
        /// PDF file to process
        file: PathBuf,

        /// Reading purpose: quick_scan, deep_dive, method_focus, review_prep, brainstorm, beginner
        #[arg(short, long, default_value = "deep_dive")]
        purpose: String,

        /// Directory for extracted images [default: <pdf dir>/<pdf stem>_figures]
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Keep at most this many figures instead of the purpose's budget
        #[arg(long)]
        max_figures: Option<usize>,

        /// Do not render whole pages for figures without a standalone image
        #[arg(long)]
        no_page_render: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Apply highlights, glossary notes and auto-notes to a PDF
    Annotate {
        /// PDF file to annotate
        file: PathBuf,

        /// Highlight requests: a JSON file or an inline JSON array
        annotations: String,

        /// Where to write the annotated PDF
        #[arg(required_unless_present = "plan")]
        output: Option<PathBuf>,

        /// Skip glossary term notes
        #[arg(long)]
        no_terms: bool,

        /// Glossary file (`term --- definition` lines) replacing the built-in one
        #[arg(long, conflicts_with = "no_terms")]
        glossary: Option<PathBuf>,

        /// Add notes for research-question, methodology and conclusion sentences
        #[arg(long)]
        auto_notes: bool,

        /// Print the draw operations as JSON instead of writing a PDF
        #[arg(long)]
        plan: bool,

        /// Delete the annotations JSON file after a successful run
        #[arg(long)]
        cleanup_json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Extract text, figures and metadata in one report
    Content {
        /// PDF file to process
        file: PathBuf,

        /// Reading purpose; also decides which pages' text is included
        #[arg(short, long, default_value = "deep_dive")]
        purpose: String,

        /// Page range such as `1-5` or `3`
        #[arg(long)]
        pages: Option<String>,

        /// Skip figure extraction
        #[arg(long)]
        no_figures: bool,

        /// Directory for extracted images
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write the report to this file instead of stdout
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let pdfium = bind_pdfium(&cli.pdfium_path)?;

    match cli.command {
        Command::Figures {
            file,
            purpose,
            output_dir,
            max_figures,
            no_page_render,
            pretty,
        } => {
            let paper = PaperPdf::open(&pdfium, &file)?;
            let purpose = ReadingPurpose::resolve(&purpose);
            let resolver = ImageResolver::new(output_dir.unwrap_or_else(|| images::default_output_dir(&file)))
                .with_render_fallback(!no_page_render);
            let manifest = run_figures(&paper, purpose, max_figures, &resolver)?;
            print_output(&manifest, pretty)
        }
        Command::Annotate {
            file,
            annotations,
            output,
            no_terms,
            glossary,
            auto_notes,
            plan,
            cleanup_json,
            pretty,
        } => {
            let glossary = match (no_terms, glossary) {
                (true, _) => None,
                (false, Some(path)) => Some(kb::load_glossary(&path)?),
                (false, None) => Some(Glossary::clone(&kb::DEFAULT_GLOSSARY)),
            };
            let requests = annotate::load_requests(&annotations);
            let mut paper = PaperPdf::open(&pdfium, &file)?;
            let ops = plan_annotations(&paper, &requests, glossary.as_ref(), auto_notes)?;

            if plan {
                return print_output(&ops, pretty);
            }
            let output = output.context("An output path is required unless --plan is given")?;
            let summary = annotate::apply(&ops, &mut paper)?;
            paper.save(&output)?;
            info!("Wrote {}", output.display());

            if cleanup_json {
                remove_annotations_file(&annotations);
            }
            print_output(&summary, pretty)
        }
        Command::Content {
            file,
            purpose,
            pages,
            no_figures,
            output_dir,
            output_file,
            pretty,
        } => {
            let paper = PaperPdf::open(&pdfium, &file)?;
            let purpose = ReadingPurpose::resolve(&purpose);
            let total = paper.page_count();
            let page_list = match pages {
                Some(range) => content::parse_page_range(&range, total, purpose),
                None => content::pages_for_purpose(purpose, total),
            };
            let figures = if no_figures {
                Vec::new()
            } else {
                let resolver =
                    ImageResolver::new(output_dir.unwrap_or_else(|| images::default_output_dir(&file)));
                run_figures(&paper, purpose, None, &resolver)?
            };
            let report = ContentReport {
                text: content::extract_text(&paper, &page_list)?,
                figures,
                metadata: content::document_metadata(&paper, &file),
            };
            match output_file {
                Some(path) => write_output(&report, &path, pretty),
                None => print_output(&report, pretty),
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();
}

fn bind_pdfium(pdfium_path: &Option<String>) -> Result<Pdfium> {
    let bindings = if let Some(path) = pdfium_path {
        Pdfium::bind_to_library(path)
            .with_context(|| format!("Failed to load pdfium from: {path}"))?
    } else {
        Pdfium::bind_to_system_library()
            .context("Failed to find pdfium. Install pdfium-binaries or use --pdfium-path")?
    };
    Ok(Pdfium::new(bindings))
}

/// Figures are looked for across the whole paper, whatever pages the
/// caller asked text for.
fn run_figures(
    source: &dyn PaperSource,
    purpose: ReadingPurpose,
    max_figures: Option<usize>,
    resolver: &ImageResolver,
) -> Result<Vec<ManifestEntry>> {
    let pages: Vec<PageText> = content::extract_all_text(source)?;
    let candidates = collect::collect_candidates(&pages, purpose);
    let selected = collect::select(candidates, purpose, max_figures);
    info!(
        "Selected {} figures for '{}' (budget {})",
        selected.len(),
        purpose.key(),
        max_figures.unwrap_or(purpose.strategy().max_figures)
    );
    Ok(images::build_manifest(&selected, source, resolver))
}

fn plan_annotations(
    source: &dyn PaperSource,
    requests: &[types::AnnotationRequest],
    glossary: Option<&Glossary>,
    auto_notes: bool,
) -> Result<Vec<types::DrawOp>> {
    let items = if auto_notes {
        annotate::sentence_items(&content::extract_all_text(source)?)
    } else {
        Vec::new()
    };
    let options = MergeOptions {
        glossary,
        auto_notes: auto_notes.then(|| AutoNotes {
            rules: &kb::DEFAULT_AUTO_NOTES,
            items: &items,
            layout: NoteLayout::default(),
        }),
    };
    Ok(annotate::merge(source, requests, &options)?)
}

fn remove_annotations_file(annotations: &str) {
    let path = Path::new(annotations);
    if path.is_file() {
        match std::fs::remove_file(path) {
            Ok(()) => info!("Removed {}", path.display()),
            Err(e) => warn!("Could not remove {}: {e}", path.display()),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn print_output<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    println!("{}", to_json(value, pretty)?);
    Ok(())
}

fn write_output<T: Serialize + ?Sized>(value: &T, path: &Path, pretty: bool) -> Result<()> {
    std::fs::write(path, to_json(value, pretty)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("Content extracted to {}", path.display());
    Ok(())
}
