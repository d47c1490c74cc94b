// triage-similarity/src/ratio.rs
// ============================================================================
// Module: String Ratio
// Description: Deterministic, symmetric bounded string similarity.
// Purpose: Back the similarity engine's title/description scoring.
// ============================================================================

//! ## Overview
//! Implements a Ratcliff/Obershelp-style "gestalt pattern matching" ratio
//! (the same family of algorithm Python's `difflib.SequenceMatcher` uses),
//! plus a token-set variant that is robust to word reordering and partial
//! overlap. Both are pure functions over `&str`, symmetric, and return `1.0`
//! for identical inputs, satisfying the similarity engine's testable
//! properties.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

// ============================================================================
// SECTION: Character Ratio
// ============================================================================

/// Computes a `[0, 1]` similarity ratio between `a` and `b` using the longest
/// matching block, recursively applied to the unmatched remainders.
#[must_use]
pub fn char_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() && b_chars.is_empty() {
        return 1.0;
    }
    let matched = matching_chars(&a_chars, &b_chars);
    let total = a_chars.len() + b_chars.len();
    if total == 0 { 1.0 } else { (2.0 * matched as f64) / (total as f64) }
}

/// Returns the total number of matched characters between `a` and `b`,
/// found by repeatedly taking the longest common substring and recursing on
/// the left and right remainders (the gestalt pattern matching algorithm).
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (a_start, b_start, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_chars(&a[..a_start], &b[..b_start]);
    let right = matching_chars(&a[a_start + len..], &b[b_start + len..]);
    left + len + right
}

/// Finds the longest common contiguous run between `a` and `b`, returning
/// `(a_start, b_start, length)`. Ties prefer the earliest match in `a`, then
/// in `b`, for determinism.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = (0usize, 0usize, 0usize);
    for (i, &a_ch) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, &b_ch) in b.iter().enumerate() {
            if a_ch == b_ch {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }
    best
}

// ============================================================================
// SECTION: Tokenization
// ============================================================================

/// Splits `text` into a sorted, deduplicated, lowercased set of alphanumeric
/// tokens.
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Computes the Jaccard index (intersection over union) of two token sets.
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 { 0.0 } else { (intersection as f64) / (union as f64) }
}

// ============================================================================
// SECTION: Token-set Ratio
// ============================================================================

/// Computes a token-order-insensitive similarity ratio between `a` and `b`.
///
/// Mirrors the "token set ratio" technique: the shared vocabulary is
/// factored out, and the best of three pairwise [`char_ratio`] comparisons
/// (shared-vs-combined-a, shared-vs-combined-b, combined-a-vs-combined-b) is
/// returned. Symmetric by construction; returns `1.0` for identical inputs.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    let intersection: BTreeSet<String> = tokens_a.intersection(&tokens_b).cloned().collect();
    let only_a: BTreeSet<String> = tokens_a.difference(&tokens_b).cloned().collect();
    let only_b: BTreeSet<String> = tokens_b.difference(&tokens_a).cloned().collect();

    let shared = join_sorted(&intersection);
    let combined_a = join_two(&shared, &join_sorted(&only_a));
    let combined_b = join_two(&shared, &join_sorted(&only_b));

    let ratios = [
        char_ratio(&shared, &combined_a),
        char_ratio(&shared, &combined_b),
        char_ratio(&combined_a, &combined_b),
    ];
    ratios.into_iter().fold(0.0_f64, f64::max)
}

/// Joins a token set with single spaces, in its already-sorted order.
fn join_sorted(tokens: &BTreeSet<String>) -> String {
    tokens.iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Joins two pre-built strings with a single space, skipping empty parts.
fn join_two(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, true) => String::new(),
        (true, false) => second.to_string(),
        (false, true) => first.to_string(),
        (false, false) => format!("{first} {second}"),
    }
}
