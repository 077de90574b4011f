use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;

use crate::types::GlossaryEntry;

// Force recompilation when KB files change (hash set by build.rs).
#[allow(dead_code)]
const _KB_HASH: &str = env!("KB_HASH");

static GLOSSARY_KB: &str = include_str!("../kbs/glossary.kb");
static AUTO_NOTES_KB: &str = include_str!("../kbs/auto-notes.kb");

/// Ordered term table. Order is the scan order on each page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    pub entries: Vec<GlossaryEntry>,
}

impl Glossary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One group of cue phrases, e.g. methodology cues, and the label its notes carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoNoteRule {
    pub label: String,
    /// Lowercase substrings; any hit fires the rule.
    pub cues: Vec<String>,
}

impl AutoNoteRule {
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.cues.iter().any(|cue| lower.contains(cue.as_str()))
    }
}

pub static DEFAULT_GLOSSARY: Lazy<Glossary> = Lazy::new(|| parse_glossary(GLOSSARY_KB));

pub static DEFAULT_AUTO_NOTES: Lazy<Vec<AutoNoteRule>> =
    Lazy::new(|| parse_auto_notes(AUTO_NOTES_KB));

/// Parse `term --- definition` lines. Later duplicates of a term are dropped.
pub fn parse_glossary(kb_text: &str) -> Glossary {
    let mut entries: Vec<GlossaryEntry> = Vec::new();
    for line in kb_text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((term, definition)) = line.split_once("---") else {
            continue;
        };
        let term = term.trim();
        if term.is_empty() || entries.iter().any(|e| e.term == term) {
            continue;
        }
        entries.push(GlossaryEntry {
            term: term.to_string(),
            definition: definition.trim().to_string(),
        });
    }
    Glossary { entries }
}

/// Load a user glossary in the same `term --- definition` format.
pub fn load_glossary(path: &Path) -> Result<Glossary> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary: {}", path.display()))?;
    let glossary = parse_glossary(&text);
    if glossary.is_empty() {
        anyhow::bail!("Glossary {} has no `term --- definition` entries", path.display());
    }
    Ok(glossary)
}

/// Parse cue groups: a `<Label>` line opens a group, following lines are cues.
pub fn parse_auto_notes(kb_text: &str) -> Vec<AutoNoteRule> {
    let mut rules: Vec<AutoNoteRule> = Vec::new();
    for line in kb_text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('<') && line.ends_with('>') {
            rules.push(AutoNoteRule {
                label: line[1..line.len() - 1].trim().to_string(),
                cues: Vec::new(),
            });
            continue;
        }
        // Cues before the first group header have no label to attach to.
        if let Some(rule) = rules.last_mut() {
            rule.cues.push(line.to_lowercase());
        }
    }
    rules.retain(|r| !r.cues.is_empty());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_glossary_loads() {
        let g = &*DEFAULT_GLOSSARY;
        assert!(g.len() >= 20);
        assert_eq!(g.entries[0].term, "TAM");
        assert!(g.entries.iter().any(|e| e.term == "Cronbach's α"));
    }

    #[test]
    fn glossary_skips_comments_and_duplicates() {
        let g = parse_glossary(
            "# header\n\nAVE --- average variance\nno separator here\nAVE --- again\n VIF ---  inflation \n",
        );
        assert_eq!(g.len(), 2);
        assert_eq!(g.entries[0].definition, "average variance");
        assert_eq!(g.entries[1].term, "VIF");
        assert_eq!(g.entries[1].definition, "inflation");
    }

    #[test]
    fn embedded_auto_notes_have_three_groups() {
        let rules = &*DEFAULT_AUTO_NOTES;
        let labels: Vec<&str> = rules.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Research question", "Methodology", "Conclusion"]);
    }

    #[test]
    fn auto_note_parsing_and_matching() {
        let rules = parse_auto_notes("orphan\n<Cue A>\nWe Propose\n<Empty>\n<Cue B>\nin summary\n");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].cues, vec!["we propose"]);
        assert!(rules[0].matches("Here WE PROPOSE a model"));
        assert!(!rules[1].matches("We propose a model"));
    }

    #[test]
    fn empty_user_glossary_is_rejected() {
        let path = std::env::temp_dir().join("paperlens_empty_glossary.kb");
        std::fs::write(&path, "# nothing\n").unwrap();
        assert!(load_glossary(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
