use serde::Serialize;
use tracing::warn;

use crate::types::Region;

/// Why the paper is being read. Decides how many figures to keep and which
/// regions count as important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingPurpose {
    QuickScan,
    #[default]
    DeepDive,
    MethodFocus,
    ReviewPrep,
    Brainstorm,
    Beginner,
}

/// Regions a purpose cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityRegions {
    All,
    Only(&'static [Region]),
}

impl PriorityRegions {
    pub fn contains(&self, region: Region) -> bool {
        match self {
            PriorityRegions::All => true,
            PriorityRegions::Only(regions) => regions.contains(&region),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurposeStrategy {
    pub max_figures: usize,
    pub priority_regions: PriorityRegions,
}

const QUICK_SCAN: PurposeStrategy = PurposeStrategy {
    max_figures: 2,
    priority_regions: PriorityRegions::Only(&[Region::Conclusion, Region::Abstract]),
};
const DEEP_DIVE: PurposeStrategy = PurposeStrategy {
    max_figures: 5,
    priority_regions: PriorityRegions::All,
};
const METHOD_FOCUS: PurposeStrategy = PurposeStrategy {
    max_figures: 4,
    priority_regions: PriorityRegions::Only(&[Region::Method]),
};
const REVIEW_PREP: PurposeStrategy = PurposeStrategy {
    max_figures: 10,
    priority_regions: PriorityRegions::All,
};
const BRAINSTORM: PurposeStrategy = PurposeStrategy {
    max_figures: 3,
    priority_regions: PriorityRegions::Only(&[Region::Introduction, Region::Method]),
};
const BEGINNER: PurposeStrategy = PurposeStrategy {
    max_figures: 3,
    priority_regions: PriorityRegions::Only(&[Region::Abstract, Region::Introduction]),
};

impl ReadingPurpose {
    pub const ALL: [ReadingPurpose; 6] = [
        ReadingPurpose::QuickScan,
        ReadingPurpose::DeepDive,
        ReadingPurpose::MethodFocus,
        ReadingPurpose::ReviewPrep,
        ReadingPurpose::Brainstorm,
        ReadingPurpose::Beginner,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ReadingPurpose::QuickScan => "quick_scan",
            ReadingPurpose::DeepDive => "deep_dive",
            ReadingPurpose::MethodFocus => "method_focus",
            ReadingPurpose::ReviewPrep => "review_prep",
            ReadingPurpose::Brainstorm => "brainstorm",
            ReadingPurpose::Beginner => "beginner",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Like `from_key`, but unknown keys fall back to the default purpose.
    pub fn resolve(key: &str) -> Self {
        Self::from_key(key).unwrap_or_else(|| {
            let fallback = Self::default();
            warn!("Unknown reading purpose '{key}', using '{}'", fallback.key());
            fallback
        })
    }

    pub fn strategy(self) -> &'static PurposeStrategy {
        match self {
            ReadingPurpose::QuickScan => &QUICK_SCAN,
            ReadingPurpose::DeepDive => &DEEP_DIVE,
            ReadingPurpose::MethodFocus => &METHOD_FOCUS,
            ReadingPurpose::ReviewPrep => &REVIEW_PREP,
            ReadingPurpose::Brainstorm => &BRAINSTORM,
            ReadingPurpose::Beginner => &BEGINNER,
        }
    }
}
