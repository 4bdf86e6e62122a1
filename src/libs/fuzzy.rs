//! Case- and accent-insensitive name matching for human lookups.
//!
//! Users refer to solutions and tables by name, often without accents or
//! exact casing ("gestion" for "Gestión de Proyectos"). This module folds
//! accented characters to ASCII, lower-cases, and falls back to per-token
//! edit-distance matching for typos.
//!
//! ## Matching rules
//!
//! A query matches a target when either:
//! - the normalised query is a substring of the normalised target, or
//! - every whitespace-separated query token matches some target token by
//!   substring or by edit distance within [`MAX_EDIT_DISTANCE`], subject to
//!   the similarity threshold.
//!
//! Short strings (3 characters or fewer) require an exact match or a
//! distance of at most 1, so "id" does not accidentally match "io".

use strsim::{levenshtein, normalized_levenshtein};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum Levenshtein distance for a token-level match.
pub const MAX_EDIT_DISTANCE: usize = 2;

/// Minimum normalised similarity for a distance-based token match.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Folds accented characters to their ASCII base and lower-cases.
///
/// Decomposition covers the Spanish/French/Portuguese accent sets (combining
/// marks are stripped after NFD); the handful of letters that do not
/// decompose (ß, æ, œ, ø, đ) are mapped explicitly.
pub fn fold_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'ß' | 'ẞ' => out.push_str("ss"),
            'æ' | 'Æ' => out.push_str("ae"),
            'œ' | 'Œ' => out.push_str("oe"),
            'ø' | 'Ø' => out.push('o'),
            'đ' | 'Đ' => out.push('d'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Normalised similarity between two already-folded strings, 0.0..=1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Whether `query` matches `target` under the fuzzy rules.
pub fn matches(target: &str, query: &str) -> bool {
    let target_norm = fold_ascii(target.trim());
    let query_norm = fold_ascii(query.trim());

    if query_norm.is_empty() || target_norm.is_empty() {
        return false;
    }

    // Whole-query substring wins outright
    if target_norm.contains(&query_norm) {
        return true;
    }

    // Otherwise every query token must find a home among the target tokens
    let target_tokens: Vec<&str> = target_norm.split_whitespace().collect();
    query_norm.split_whitespace().all(|qt| target_tokens.iter().any(|tt| token_matches(tt, qt)))
}

/// Token-level match: substring, or bounded edit distance.
fn token_matches(target_token: &str, query_token: &str) -> bool {
    if target_token.contains(query_token) {
        return true;
    }

    let distance = levenshtein(target_token, query_token);

    // Short tokens get a tighter bound: exact or one edit
    if query_token.chars().count() <= 3 || target_token.chars().count() <= 3 {
        return distance <= 1;
    }

    distance <= MAX_EDIT_DISTANCE && similarity(target_token, query_token) >= SIMILARITY_THRESHOLD
}

/// Finds the best-matching candidate by name, if any matches at all.
///
/// Ties are broken by similarity of the folded full strings, so an exact
/// (folded) name wins over a token-level match.
pub fn best_match<'a, T>(candidates: &'a [T], query: &str, name_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    let query_norm = fold_ascii(query.trim());
    candidates
        .iter()
        .filter(|c| matches(name_of(c), query))
        .max_by(|a, b| {
            let sa = similarity(&fold_ascii(name_of(a)), &query_norm);
            let sb = similarity(&fold_ascii(name_of(b)), &query_norm);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        })
}
