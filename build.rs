use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Knowledge bases embedded by `include_str!` in kb.rs.
const KB_FILES: [&str; 2] = ["kbs/glossary.kb", "kbs/auto-notes.kb"];

fn main() {
    let mut hasher = DefaultHasher::new();
    for kb in KB_FILES {
        println!("cargo::rerun-if-changed={kb}");
        if let Ok(contents) = std::fs::read_to_string(kb) {
            contents.hash(&mut hasher);
        }
    }
    // Changing the env var recompiles the crate, not just this script.
    println!("cargo::rustc-env=KB_HASH={}", hasher.finish());
}
