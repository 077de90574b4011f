use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{fallback_caption, FigureCandidate, FigureKind};

/// Longest caption fragment kept after the "Figure N:" prefix, in characters.
pub const CAPTION_MAX_CHARS: usize = 150;

/// Separator and caption text following a reference number, up to line end.
static CAPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*([:：.])[ \t]*([^\r\n]*)").unwrap());

/// One label family (e.g. "Figure", "Fig.", "图") mapped to a kind.
pub struct FigureRule {
    pub kind: FigureKind,
    pattern: Regex,
}

impl FigureRule {
    /// `labels` is a regex alternation of label spellings. Word-boundary and
    /// case handling is up to the caller: the default rules put `\b` in
    /// front of Latin labels only, since CJK labels follow other letters.
    pub fn new(kind: FigureKind, labels: &str) -> Result<Self, regex::Error> {
        // 1: number ("3", "12", "1a")
        let pattern = Regex::new(&format!(r"(?i)(?:{labels})\s*(\d+(?:(?-i:[a-z])\b)?)"))?;
        Ok(Self { kind, pattern })
    }
}

/// Every figure-rule hit on a page, before per-page dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    pub kind: FigureKind,
    pub number: String,
    pub offset: usize,
    number_end: usize,
    pub caption: Option<String>,
}

/// Scans page text for figure/table references using an ordered rule list.
pub struct ReferenceDetector {
    rules: Vec<FigureRule>,
}

impl Default for ReferenceDetector {
    fn default() -> Self {
        Self::new(vec![
            FigureRule::new(FigureKind::Figure, r"\b(?:figure|fig\.?)|图").unwrap(),
            FigureRule::new(FigureKind::Table, r"\b(?:table|tab\.)|表").unwrap(),
            FigureRule::new(FigureKind::Figure, r"\bchart|图表").unwrap(),
            FigureRule::new(FigureKind::Figure, r"\bdiagram|框图").unwrap(),
        ])
    }
}

pub static DEFAULT_DETECTOR: Lazy<ReferenceDetector> = Lazy::new(ReferenceDetector::default);

impl ReferenceDetector {
    pub fn new(rules: Vec<FigureRule>) -> Self {
        Self { rules }
    }

    /// All rule hits in offset order.
    pub fn raw_matches(&self, text: &str) -> Vec<RawMatch> {
        let mut matches: Vec<RawMatch> = self
            .rules
            .iter()
            .flat_map(|rule| {
                rule.pattern
                    .captures_iter(text)
                    .filter_map(move |caps| raw_match(rule.kind, text, &caps))
            })
            .collect();
        matches.sort_by_key(|m| (m.offset, m.kind));
        // "图表 3" also matches the shorter "表 3"; the longest label owns a number.
        let mut claimed = HashSet::new();
        matches.retain(|m| claimed.insert(m.number_end));
        matches
    }

    /// Candidates on one page, at most one per (kind, number).
    ///
    /// The earliest occurrence keeps its offset. If it has no caption, the
    /// first captioned occurrence later on the page lends its caption.
    pub fn detect(&self, page_text: &str, page_number: usize) -> Vec<FigureCandidate> {
        let mut found: Vec<(FigureCandidate, bool)> = Vec::new();
        for m in self.raw_matches(page_text) {
            let existing = found
                .iter_mut()
                .find(|(c, _)| c.key() == (m.kind, m.number.as_str()));
            match existing {
                Some((candidate, captioned)) => {
                    if !*captioned && let Some(caption) = m.caption {
                        candidate.caption = caption;
                        *captioned = true;
                    }
                }
                None => {
                    let captioned = m.caption.is_some();
                    let caption = m
                        .caption
                        .unwrap_or_else(|| fallback_caption(m.kind, &m.number));
                    found.push((
                        FigureCandidate {
                            page_number,
                            kind: m.kind,
                            number: m.number,
                            caption,
                            match_offset: m.offset,
                            importance_score: 0.0,
                        },
                        captioned,
                    ));
                }
            }
        }
        found.into_iter().map(|(c, _)| c).collect()
    }

    /// Count mentions of one figure on a page, defining match included.
    pub fn count_references(&self, page_text: &str, kind: FigureKind, number: &str) -> usize {
        self.raw_matches(page_text)
            .iter()
            .filter(|m| m.kind == kind && m.number == number)
            .count()
    }
}

/// Detect with the default rule set.
pub fn detect(page_text: &str, page_number: usize) -> Vec<FigureCandidate> {
    DEFAULT_DETECTOR.detect(page_text, page_number)
}

fn raw_match(kind: FigureKind, text: &str, caps: &regex::Captures) -> Option<RawMatch> {
    let whole = caps.get(0)?;
    let number = caps.get(1)?;
    Some(RawMatch {
        kind,
        number: number.as_str().to_string(),
        offset: whole.start(),
        number_end: number.end(),
        caption: parse_caption(text, whole.start(), number.end()),
    })
}

fn parse_caption(text: &str, label_start: usize, number_end: usize) -> Option<String> {
    let caps = CAPTION_RE.captures(&text[number_end..])?;
    let separator = caps.get(1)?.as_str();
    if !accepts_caption(text, label_start, separator) {
        return None;
    }
    let fragment = caps.get(2)?;
    let body = fragment.as_str();
    let capped = match body.char_indices().nth(CAPTION_MAX_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    };
    let capped = capped.trim_end();
    if capped.is_empty() {
        return None;
    }
    let prefix = &text[label_start..number_end + fragment.start()];
    Some(format!("{prefix}{capped}"))
}

/// A colon always introduces a caption. A period only does when the label
/// starts its line ("Figure 2. Results"), not mid-sentence ("see Figure 2. The").
fn accepts_caption(text: &str, label_start: usize, separator: &str) -> bool {
    if separator != "." {
        return true;
    }
    let line_start = text[..label_start].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..label_start].trim().is_empty()
}
