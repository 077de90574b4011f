use std::collections::HashMap;

use tracing::debug;

use crate::markers;
use crate::scoring;
use crate::strategy::ReadingPurpose;
use crate::types::{FigureCandidate, FigureKind, PageText};

/// Detect and score candidates on every page, in page order.
///
/// Each page contributes at most one candidate per (kind, number), scored
/// against that page's text.
pub fn collect_candidates(pages: &[PageText], purpose: ReadingPurpose) -> Vec<FigureCandidate> {
    let mut candidates = Vec::new();
    for page in pages {
        for mut candidate in markers::detect(&page.raw_text, page.page_number) {
            candidate.importance_score = scoring::score(&candidate, &page.raw_text, purpose);
            candidates.push(candidate);
        }
    }
    debug!("Collected {} figure candidates from {} pages", candidates.len(), pages.len());
    candidates
}

/// Pick the figures to keep: dedup by (kind, number), order by score,
/// truncate to `max_override` or the purpose's budget.
///
/// Deterministic: input is first put in (page, offset) order, the sort is
/// stable and score ties keep document order.
pub fn select(
    mut candidates: Vec<FigureCandidate>,
    purpose: ReadingPurpose,
    max_override: Option<usize>,
) -> Vec<FigureCandidate> {
    candidates.sort_by_key(|c| (c.page_number, c.match_offset));
    let mut selected = dedup_candidates(candidates);
    selected.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));
    let budget = max_override.unwrap_or(purpose.strategy().max_figures);
    selected.truncate(budget);
    selected
}

/// Merge occurrences of the same logical figure. The highest-scoring
/// occurrence wins, the earliest on ties. A winner without a real caption
/// borrows the first real caption seen for that figure.
fn dedup_candidates(candidates: Vec<FigureCandidate>) -> Vec<FigureCandidate> {
    let mut index: HashMap<(FigureKind, String), usize> = HashMap::new();
    let mut unique: Vec<FigureCandidate> = Vec::new();
    let mut captions: Vec<Option<String>> = Vec::new();

    for candidate in candidates {
        let real_caption = candidate
            .has_real_caption()
            .then(|| candidate.caption.clone());
        match index.get(&(candidate.kind, candidate.number.clone())) {
            Some(&slot) => {
                if captions[slot].is_none() {
                    captions[slot] = real_caption;
                }
                if candidate.importance_score > unique[slot].importance_score {
                    unique[slot] = candidate;
                }
            }
            None => {
                index.insert((candidate.kind, candidate.number.clone()), unique.len());
                captions.push(real_caption);
                unique.push(candidate);
            }
        }
    }

    for (candidate, caption) in unique.iter_mut().zip(captions) {
        if !candidate.has_real_caption() && let Some(caption) = caption {
            candidate.caption = caption;
        }
    }
    unique
}
