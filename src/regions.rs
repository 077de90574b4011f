use crate::types::Region;

/// Keyword sets checked in order; the first region with any hit wins.
///
/// A page mentioning both "abstract" and "conclusion" is classified as
/// `Abstract`. Pages get exactly one label.
static REGION_KEYWORDS: &[(Region, &[&str])] = &[
    (Region::Abstract, &["abstract", "摘要", "summary"]),
    (
        Region::Conclusion,
        &["conclusion", "结论", "findings", "results", "发现"],
    ),
    (
        Region::Method,
        &["method", "methodology", "approach", "方法", "框架", "framework"],
    ),
    (
        Region::Introduction,
        &["introduction", "引言", "背景", "background"],
    ),
];

/// Label a page by keyword presence. Falls back to `Body`.
pub fn classify(page_text: &str) -> Region {
    let lower = page_text.to_lowercase();
    REGION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(region, _)| *region)
        .unwrap_or(Region::Body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_body() {
        assert_eq!(classify("Figure 1: Model overview"), Region::Body);
        assert_eq!(classify(""), Region::Body);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert_eq!(classify("2. METHODOLOGY\nWe sampled..."), Region::Method);
        assert_eq!(classify("1 Introduction"), Region::Introduction);
    }

    #[test]
    fn first_region_in_order_wins() {
        let text = "Abstract. ... In conclusion, the model works.";
        assert_eq!(classify(text), Region::Abstract);
        let text = "Our approach yields the following results.";
        assert_eq!(classify(text), Region::Conclusion);
    }

    #[test]
    fn chinese_keywords() {
        assert_eq!(classify("三、研究方法"), Region::Method);
        assert_eq!(classify("摘要：本文"), Region::Abstract);
    }
}
