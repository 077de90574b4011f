//! Merges highlight requests, glossary notes and auto-generated notes into
//! one ordered list of draw operations, then replays it onto a document.
//!
//! Order is fixed: requests first, then glossary notes, then auto-notes.
//! Later steps only add operations.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PdfError;
use crate::kb::{AutoNoteRule, Glossary};
use crate::pdf::{AnnotationSink, PaperSource};
use crate::types::{AnnotationRequest, DrawOp, HighlightKind, NoteSource, PageText, Point};

/// Horizontal gap between a glossary term and its note.
const GLOSSARY_NOTE_GAP: f32 = 5.0;
const EXCERPT_MAX_CHARS: usize = 120;

/// Where auto-notes go: a column at `x`, stacked downward from `base_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteLayout {
    pub x: f32,
    pub base_y: f32,
    pub step: f32,
}

impl Default for NoteLayout {
    fn default() -> Self {
        Self {
            x: 20.0,
            base_y: 40.0,
            step: 50.0,
        }
    }
}

/// A piece of page text evaluated against auto-note rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextItem {
    pub page_number: usize,
    pub text: String,
}

pub struct AutoNotes<'a> {
    pub rules: &'a [AutoNoteRule],
    pub items: &'a [TextItem],
    pub layout: NoteLayout,
}

/// Optional stages of a merge. Both off means requests only.
#[derive(Default)]
pub struct MergeOptions<'a> {
    pub glossary: Option<&'a Glossary>,
    pub auto_notes: Option<AutoNotes<'a>>,
}

/// Build the draw-op list for one document pass.
///
/// Glossary dedup state lives only for this call: running it again on the
/// same document yields the same first-occurrence notes.
pub fn merge(
    source: &dyn PaperSource,
    requests: &[AnnotationRequest],
    options: &MergeOptions,
) -> Result<Vec<DrawOp>, PdfError> {
    let mut ops = Vec::new();
    merge_requests(source, requests, &mut ops)?;

    if let Some(glossary) = options.glossary {
        let mut annotated: HashSet<String> = HashSet::new();
        annotate_glossary(source, glossary, &mut annotated, &mut ops)?;
    }

    if let Some(auto_notes) = &options.auto_notes {
        generate_auto_notes(auto_notes, &mut ops);
    }

    debug!("Merged {} draw operations", ops.len());
    Ok(ops)
}

fn merge_requests(
    source: &dyn PaperSource,
    requests: &[AnnotationRequest],
    ops: &mut Vec<DrawOp>,
) -> Result<(), PdfError> {
    let page_count = source.page_count();
    for request in requests {
        match request {
            AnnotationRequest::Highlight {
                page_number,
                kind,
                text,
            } => {
                if text.trim().is_empty() {
                    continue;
                }
                if !(1..=page_count).contains(page_number) {
                    warn!("Skipping highlight on page {page_number}: document has {page_count} pages");
                    continue;
                }
                for region in source.search_literal(*page_number, text)? {
                    ops.push(DrawOp::Highlight {
                        page_number: *page_number,
                        kind: *kind,
                        region,
                        color: kind.color(),
                    });
                }
            }
            AnnotationRequest::TextNote {
                page_number,
                position,
                body,
            } => {
                if !(1..=page_count).contains(page_number) {
                    warn!("Skipping note on page {page_number}: document has {page_count} pages");
                    continue;
                }
                ops.push(DrawOp::Note {
                    page_number: *page_number,
                    source: NoteSource::Request,
                    position: *position,
                    body: body.clone(),
                    color: HighlightKind::Background.color(),
                });
            }
        }
    }
    Ok(())
}

/// Note each term once per document, at its first page-ordered hit.
fn annotate_glossary(
    source: &dyn PaperSource,
    glossary: &Glossary,
    annotated: &mut HashSet<String>,
    ops: &mut Vec<DrawOp>,
) -> Result<(), PdfError> {
    for page_number in 1..=source.page_count() {
        for entry in &glossary.entries {
            if annotated.contains(&entry.term) {
                continue;
            }
            let hits = source.search_literal(page_number, &entry.term)?;
            let Some(anchor) = hits.first().and_then(|r| r.quads.first()) else {
                continue;
            };
            ops.push(DrawOp::Note {
                page_number,
                source: NoteSource::Glossary,
                position: Point {
                    x: anchor.x1 + GLOSSARY_NOTE_GAP,
                    y: anchor.y0,
                },
                body: format!("{}: {}", entry.term, entry.definition),
                color: HighlightKind::Term.color(),
            });
            annotated.insert(entry.term.clone());
        }
        if annotated.len() == glossary.len() {
            break;
        }
    }
    Ok(())
}

/// One note per (item, matching rule), stacked down the page in emit order.
fn generate_auto_notes(auto_notes: &AutoNotes, ops: &mut Vec<DrawOp>) {
    let layout = auto_notes.layout;
    let mut emitted_per_page: HashMap<usize, usize> = HashMap::new();
    for item in auto_notes.items {
        for rule in auto_notes.rules {
            if !rule.matches(&item.text) {
                continue;
            }
            let slot = emitted_per_page.entry(item.page_number).or_insert(0);
            ops.push(DrawOp::Note {
                page_number: item.page_number,
                source: NoteSource::AutoNote,
                position: Point {
                    x: layout.x,
                    y: layout.base_y + layout.step * *slot as f32,
                },
                body: format!("{}: {}", rule.label, excerpt(&item.text)),
                color: HighlightKind::Relevant.color(),
            });
            *slot += 1;
        }
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Split page text into sentence items for auto-note evaluation.
pub fn sentence_items(pages: &[PageText]) -> Vec<TextItem> {
    let mut items = Vec::new();
    for page in pages {
        let flat = page.raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut current = String::new();
        let mut chars = flat.chars().peekable();
        while let Some(ch) = chars.next() {
            current.push(ch);
            let boundary = ch == '。'
                || (matches!(ch, '.' | '?' | '!') && chars.peek().is_none_or(|c| *c == ' '));
            if boundary {
                push_item(&mut items, page.page_number, &mut current);
            }
        }
        push_item(&mut items, page.page_number, &mut current);
    }
    items
}

fn push_item(items: &mut Vec<TextItem>, page_number: usize, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        items.push(TextItem {
            page_number,
            text: text.to_string(),
        });
    }
    current.clear();
}

/// Counts of what `apply` drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub highlights: usize,
    pub request_notes: usize,
    pub glossary_notes: usize,
    pub auto_notes: usize,
}

/// Replay draw ops onto a document, in order.
pub fn apply(ops: &[DrawOp], sink: &mut dyn AnnotationSink) -> Result<ApplySummary, PdfError> {
    let mut summary = ApplySummary::default();
    for op in ops {
        match op {
            DrawOp::Highlight {
                page_number,
                region,
                color,
                ..
            } => {
                sink.draw_highlight(*page_number, region, *color)?;
                summary.highlights += 1;
            }
            DrawOp::Note {
                page_number,
                source,
                position,
                body,
                color,
            } => {
                sink.draw_text_note(*page_number, *position, body, *color)?;
                match source {
                    NoteSource::Request => summary.request_notes += 1,
                    NoteSource::Glossary => summary.glossary_notes += 1,
                    NoteSource::AutoNote => summary.auto_notes += 1,
                }
            }
        }
    }
    Ok(summary)
}

/// Request record as written by callers:
/// `{"page": 2, "type": "method", "text": "..."}`, or `"type": "text_note"` with `x`/`y`.
#[derive(Debug, Deserialize)]
struct RawAnnotation {
    #[serde(default = "first_page")]
    page: usize,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: String,
    x: Option<f32>,
    y: Option<f32>,
}

fn first_page() -> usize {
    1
}

/// Parse a JSON array of request records. A record that does not fit the
/// format (negative page, null text, string coordinates) is skipped on its
/// own; only a document that is not a JSON array is an error.
pub fn parse_requests(json: &str) -> Result<Vec<AnnotationRequest>, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let requests = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<RawAnnotation>(record) {
            Ok(raw) => Some(to_request(raw)),
            Err(e) => {
                warn!("Skipping annotation #{}: {e}", i + 1);
                None
            }
        })
        .collect();
    Ok(requests)
}

fn to_request(raw: RawAnnotation) -> AnnotationRequest {
    let default_pos = NoteLayout::default();
    match raw.kind.as_deref() {
        Some("text_note") => AnnotationRequest::TextNote {
            page_number: raw.page,
            position: Point {
                x: raw.x.unwrap_or(default_pos.x),
                y: raw.y.unwrap_or(default_pos.base_y),
            },
            body: raw.text,
        },
        tag => AnnotationRequest::Highlight {
            page_number: raw.page,
            kind: HighlightKind::from_tag(tag.unwrap_or("background")),
            text: raw.text,
        },
    }
}

/// `arg` is a path to a JSON file or the JSON itself. Unreadable input, or
/// input that is not a JSON array, yields no requests.
pub fn load_requests(arg: &str) -> Vec<AnnotationRequest> {
    let path = Path::new(arg);
    let json = if path.is_file() {
        match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {e}; no highlights applied", path.display());
                return Vec::new();
            }
        }
    } else {
        arg.to_string()
    };
    parse_requests(&json).unwrap_or_else(|e| {
        warn!("Annotations are not valid JSON ({e}); no highlights applied");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{parse_auto_notes, parse_glossary, DEFAULT_AUTO_NOTES};
    use crate::testutil::{FakePaper, RecordingSink};

    fn highlight(page: usize, kind: HighlightKind, text: &str) -> AnnotationRequest {
        AnnotationRequest::Highlight {
            page_number: page,
            kind,
            text: text.to_string(),
        }
    }

    fn notes_from(ops: &[DrawOp], wanted: NoteSource) -> Vec<(usize, Point, String)> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Note {
                    page_number,
                    source,
                    position,
                    body,
                    ..
                } if *source == wanted => Some((*page_number, *position, body.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_highlight_text_is_a_no_op() {
        let paper = FakePaper::new(&["method section"]);
        let ops = merge(
            &paper,
            &[highlight(1, HighlightKind::Method, "")],
            &MergeOptions::default(),
        )
        .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn one_op_per_occurrence_and_none_for_misses() {
        let paper = FakePaper::new(&["trust drives use; trust matters", "other"]);
        let ops = merge(
            &paper,
            &[
                highlight(1, HighlightKind::Conclusion, "trust"),
                highlight(2, HighlightKind::Quote, "absent phrase"),
            ],
            &MergeOptions::default(),
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        for op in &ops {
            match op {
                DrawOp::Highlight { kind, color, .. } => {
                    assert_eq!(*kind, HighlightKind::Conclusion);
                    assert_eq!(*color, HighlightKind::Conclusion.color());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn out_of_range_requests_are_skipped() {
        let paper = FakePaper::new(&["only page"]);
        let requests = vec![
            highlight(4, HighlightKind::Method, "only"),
            AnnotationRequest::TextNote {
                page_number: 0,
                position: Point { x: 1.0, y: 1.0 },
                body: "lost".to_string(),
            },
        ];
        let ops = merge(&paper, &requests, &MergeOptions::default()).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn glossary_term_annotated_once_at_first_page() {
        let mut pages = vec!["filler"; 8];
        pages[2] = "Intro\nWe extend TAM here, TAM again";
        pages[6] = "TAM shows up later too";
        let paper = FakePaper::new(&pages);
        let glossary = parse_glossary("TAM --- Technology Acceptance Model");
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: None,
        };
        let ops = merge(&paper, &[], &options).unwrap();
        let notes = notes_from(&ops, NoteSource::Glossary);
        assert_eq!(notes.len(), 1);
        let (page, position, body) = &notes[0];
        assert_eq!(*page, 3);
        assert_eq!(body, "TAM: Technology Acceptance Model");
        // "TAM" at column 10 of line 1 in the fake layout
        assert_eq!(*position, Point { x: 155.0, y: 86.0 });
    }

    #[test]
    fn glossary_state_does_not_leak_between_calls() {
        let paper = FakePaper::new(&["uses SEM and AVE", "SEM again"]);
        let glossary = parse_glossary("SEM --- structural\nAVE --- variance\nVIF --- inflation");
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: None,
        };
        let first = merge(&paper, &[], &options).unwrap();
        let second = merge(&paper, &[], &options).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let paper = FakePaper::new(&["We propose TAM for trust."]);
        let glossary = parse_glossary("TAM --- model");
        let items = sentence_items(&[PageText {
            page_number: 1,
            raw_text: paper.pages[0].clone(),
        }]);
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: Some(AutoNotes {
                rules: &DEFAULT_AUTO_NOTES,
                items: &items,
                layout: NoteLayout::default(),
            }),
        };
        let ops = merge(&paper, &[highlight(1, HighlightKind::Relevant, "trust")], &options)
            .unwrap();
        let order: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                DrawOp::Highlight { .. } => "highlight",
                DrawOp::Note { source, .. } => match source {
                    NoteSource::Request => "request",
                    NoteSource::Glossary => "glossary",
                    NoteSource::AutoNote => "auto",
                },
            })
            .collect();
        assert_eq!(order, vec!["highlight", "glossary", "auto"]);
    }

    #[test]
    fn auto_notes_stack_per_page() {
        let rules = parse_auto_notes("<Question>\nwe ask\n<Method>\nwe propose\n");
        let items = vec![
            TextItem {
                page_number: 1,
                text: "We ask why and we propose how.".to_string(),
            },
            TextItem {
                page_number: 1,
                text: "Nothing here.".to_string(),
            },
            TextItem {
                page_number: 2,
                text: "Finally we propose more.".to_string(),
            },
        ];
        let paper = FakePaper::new(&["", ""]);
        let options = MergeOptions {
            glossary: None,
            auto_notes: Some(AutoNotes {
                rules: &rules,
                items: &items,
                layout: NoteLayout::default(),
            }),
        };
        let notes = notes_from(&merge(&paper, &[], &options).unwrap(), NoteSource::AutoNote);
        let placed: Vec<(usize, f32, f32)> =
            notes.iter().map(|(p, pos, _)| (*p, pos.x, pos.y)).collect();
        assert_eq!(
            placed,
            vec![(1, 20.0, 40.0), (1, 20.0, 90.0), (2, 20.0, 40.0)]
        );
        assert!(notes[0].2.starts_with("Question: We ask why"));
        assert!(notes[1].2.starts_with("Method: "));
    }

    #[test]
    fn long_excerpts_are_truncated() {
        let long = "word ".repeat(60);
        let short = excerpt(&long);
        assert!(short.ends_with('…'));
        assert!(short.chars().count() <= EXCERPT_MAX_CHARS + 1);
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn sentences_split_across_line_breaks() {
        let items = sentence_items(&[PageText {
            page_number: 4,
            raw_text: "We investigate\nadoption. Results (p < 0.05) hold! e.g. 3.5 stays".to_string(),
        }]);
        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "We investigate adoption.",
                "Results (p < 0.05) hold!",
                "e.g.",
                "3.5 stays"
            ]
        );
        assert!(items.iter().all(|i| i.page_number == 4));
    }

    #[test]
    fn apply_replays_in_order_and_counts() {
        let paper = FakePaper::new(&["TAM and trust"]);
        let glossary = parse_glossary("TAM --- model");
        let requests = vec![
            highlight(1, HighlightKind::Method, "trust"),
            AnnotationRequest::TextNote {
                page_number: 1,
                position: Point { x: 30.0, y: 40.0 },
                body: "check this".to_string(),
            },
        ];
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: None,
        };
        let ops = merge(&paper, &requests, &options).unwrap();
        let mut sink = RecordingSink::default();
        let summary = apply(&ops, &mut sink).unwrap();
        assert_eq!(
            summary,
            ApplySummary {
                highlights: 1,
                request_notes: 1,
                glossary_notes: 1,
                auto_notes: 0,
            }
        );
        assert_eq!(sink.calls[0], "highlight p1 quads=1");
        assert_eq!(sink.calls[1], "note p1 (30, 40) check this");
        assert!(sink.calls[2].starts_with("note p1 (95, 72) TAM: model"));
    }

    #[test]
    fn request_json_with_defaults_and_text_notes() {
        let requests = parse_requests(
            r#"[
                {"page": 2, "type": "method", "text": "PLS-SEM"},
                {"type": "unknown-tag", "text": "x"},
                {"page": 3, "type": "text_note", "text": "n", "x": 10, "y": 20}
            ]"#,
        )
        .unwrap();
        assert_eq!(requests[0], highlight(2, HighlightKind::Method, "PLS-SEM"));
        assert_eq!(requests[1], highlight(1, HighlightKind::Background, "x"));
        assert_eq!(
            requests[2],
            AnnotationRequest::TextNote {
                page_number: 3,
                position: Point { x: 10.0, y: 20.0 },
                body: "n".to_string(),
            }
        );
    }

    #[test]
    fn bad_records_are_skipped_individually() {
        let requests = load_requests(
            r#"[
                {"page": 1, "type": "method", "text": "keep me"},
                {"page": -1, "type": "method", "text": "bad page"},
                {"page": 2, "type": "quote", "text": null},
                {"page": 3, "type": "text_note", "text": "n", "x": "10"},
                {"page": 4, "type": "text_note", "text": "also kept", "x": 5, "y": 6}
            ]"#,
        );
        assert_eq!(
            requests,
            vec![
                highlight(1, HighlightKind::Method, "keep me"),
                AnnotationRequest::TextNote {
                    page_number: 4,
                    position: Point { x: 5.0, y: 6.0 },
                    body: "also kept".to_string(),
                },
            ]
        );
    }

    #[test]
    fn glossary_search_failure_aborts_merge() {
        let mut paper = FakePaper::new(&["TAM here", "SEM there"]);
        paper.text_fails_on = Some(2);
        let glossary = parse_glossary("TAM --- model\nSEM --- structural");
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: None,
        };
        let result = merge(
            &paper,
            &[highlight(1, HighlightKind::Method, "TAM")],
            &options,
        );
        assert!(matches!(result, Err(PdfError::Pdfium { page: 2, .. })));
    }

    #[test]
    fn malformed_inline_json_falls_back_to_no_requests() {
        assert!(load_requests("{not json").is_empty());
        assert_eq!(load_requests(r#"[{"page":1,"text":"a"}]"#).len(), 1);
    }

    #[test]
    fn draw_ops_serialize_with_op_tag() {
        let paper = FakePaper::new(&["TAM"]);
        let glossary = parse_glossary("TAM --- model");
        let options = MergeOptions {
            glossary: Some(&glossary),
            auto_notes: None,
        };
        let ops = merge(&paper, &[], &options).unwrap();
        let json = serde_json::to_value(&ops).unwrap();
        assert_eq!(json[0]["op"], "note");
        assert_eq!(json[0]["source"], "glossary");
        assert_eq!(json[0]["page_number"], 1);
    }
}
