//! Trigram similarity for near-duplicate key detection.
//!
//! Mirrors Postgres `pg_trgm` semantics: strings are lowercased, split on
//! non-alphanumerics, each word padded with two leading and one trailing
//! space, and similarity is the Jaccard ratio of the trigram sets. The
//! default match threshold of 0.3 matches `pg_trgm`'s.

use std::collections::HashSet;

/// Extract the padded trigram set of a string.
fn trigrams(s: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    let lowered = s.to_lowercase();
    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let padded: Vec<char> = std::iter::repeat(' ')
            .take(2)
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for w in padded.windows(3) {
            set.insert([w[0], w[1], w[2]]);
        }
    }
    set
}

/// Trigram similarity between two strings, in [0.0, 1.0].
pub fn similarity(a: &str, b: &str) -> f32 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return if a.trim().eq_ignore_ascii_case(b.trim()) {
            1.0
        } else {
            0.0
        };
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f32 / union as f32
}
