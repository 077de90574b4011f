use crate::markers::{ReferenceDetector, DEFAULT_DETECTOR};
use crate::regions;
use crate::strategy::ReadingPurpose;
use crate::types::{FigureCandidate, FigureKind};

const REGION_BONUS: f64 = 10.0;
const EARLY_PAGE_BONUS: f64 = 5.0;
/// Pages at or before this one hold overview figures.
const EARLY_PAGE_LIMIT: usize = 2;
const EXTRA_REFERENCE_POINTS: f64 = 2.0;
const METHOD_TABLE_BONUS: f64 = 3.0;

/// Importance of a candidate on its own page. Additive, no upper bound.
pub fn score(candidate: &FigureCandidate, page_text: &str, purpose: ReadingPurpose) -> f64 {
    score_with(&DEFAULT_DETECTOR, candidate, page_text, purpose)
}

pub fn score_with(
    detector: &ReferenceDetector,
    candidate: &FigureCandidate,
    page_text: &str,
    purpose: ReadingPurpose,
) -> f64 {
    let mut score = 0.0;

    let region = regions::classify(page_text);
    if purpose.strategy().priority_regions.contains(region) {
        score += REGION_BONUS;
    }

    if candidate.page_number <= EARLY_PAGE_LIMIT {
        score += EARLY_PAGE_BONUS;
    }

    // Mentions beyond the defining one.
    let mentions = detector.count_references(page_text, candidate.kind, &candidate.number);
    score += EXTRA_REFERENCE_POINTS * mentions.saturating_sub(1) as f64;

    if purpose == ReadingPurpose::MethodFocus && candidate.kind == FigureKind::Table {
        score += METHOD_TABLE_BONUS;
    }

    score
}
