//! String and phonetic similarity primitives
//!
//! Field-agnostic metrics used by the rule-based matcher and the feature
//! extractor. All functions return a similarity score in range [0.0, 1.0]
//! where 1.0 means identical.

use ahash::AHashMap;
use rphonetic::{Encoder, Soundex};
use serde::{Deserialize, Serialize};

/// The string metric ensemble for one pair of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringSimilarity {
    pub jaro_winkler: f64,
    pub levenshtein: f64,
    pub sequence_matcher: f64,
    pub exact: f64,
}

impl StringSimilarity {
    /// Nothing to disagree on
    pub const IDENTICAL: Self = Self {
        jaro_winkler: 1.0,
        levenshtein: 1.0,
        sequence_matcher: 1.0,
        exact: 1.0,
    };

    pub const DISJOINT: Self = Self {
        jaro_winkler: 0.0,
        levenshtein: 0.0,
        sequence_matcher: 0.0,
        exact: 0.0,
    };

    /// Best of the four metrics
    pub fn max(&self) -> f64 {
        self.jaro_winkler
            .max(self.levenshtein)
            .max(self.sequence_matcher)
            .max(self.exact)
    }
}

/// Compute the metric ensemble for two strings
///
/// Both empty gives all 1.0 and exactly one empty gives all 0.0. Otherwise
/// every metric is computed on the lowercased, trimmed inputs.
pub fn string_similarity(a: &str, b: &str) -> StringSimilarity {
    let norm1 = a.trim().to_lowercase();
    let norm2 = b.trim().to_lowercase();

    match (norm1.is_empty(), norm2.is_empty()) {
        (true, true) => return StringSimilarity::IDENTICAL,
        (true, false) | (false, true) => return StringSimilarity::DISJOINT,
        _ => {}
    }

    StringSimilarity {
        jaro_winkler: jaro_winkler(&norm1, &norm2),
        levenshtein: levenshtein_ratio(&norm1, &norm2),
        sequence_matcher: sequence_ratio(&norm1, &norm2),
        exact: if norm1 == norm2 { 1.0 } else { 0.0 },
    }
}

/// Jaro-Winkler similarity (prefix scale 0.1, up to 4 characters)
#[inline]
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

/// `1 - levenshtein(a, b) / max(len(a), len(b), 1)` over characters
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count()).max(1);
    1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
}

/// Ratcliff/Obershelp ratio `2 * M / T`
///
/// `M` is the number of characters in matching blocks found by repeatedly
/// taking the longest common block and recursing on both sides of it, `T`
/// the total length of both strings. Ties between equally long blocks go to
/// the one starting earliest in `a`, then earliest in `b`. No junk
/// heuristic is applied.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: AHashMap<char, Vec<usize>> = AHashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows
fn longest_match(
    a: &[char],
    b2j: &AHashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // j -> length of the match ending at (i - 1, j)
    let mut run_lengths: AHashMap<usize, usize> = AHashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_lengths = AHashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let previous = if j > 0 {
                    run_lengths.get(&(j - 1)).copied().unwrap_or(0)
                } else {
                    0
                };
                let k = previous + 1;
                next_lengths.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        run_lengths = next_lengths;
    }

    (best_i, best_j, best_size)
}

/// Soundex code of the ASCII letters in `s`, `None` if there are none
pub fn soundex(s: &str) -> Option<String> {
    let letters: String = s.chars().filter(char::is_ascii_alphabetic).collect();
    if letters.is_empty() {
        return None;
    }
    let code = Soundex::default().encode(&letters);
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// 1.0 if both values share a Soundex code, 0.0 otherwise
///
/// Both empty gives 1.0, exactly one empty gives 0.0, and a value with no
/// encodable letters counts as an encoding failure (0.0).
pub fn phonetic_similarity(a: &str, b: &str) -> f64 {
    match (a.trim().is_empty(), b.trim().is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    match (soundex(a), soundex(b)) {
        (Some(code1), Some(code2)) if code1 == code2 => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => {
            tracing::debug!("Phonetic encoding failed for {:?} / {:?}", a, b);
            0.0
        }
    }
}
