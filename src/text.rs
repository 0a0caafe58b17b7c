//! Text normalization and fuzzy similarity.
//!
//! All matching in the game runs over a canonical form: lowercase ASCII with
//! German umlauts expanded to digraphs and remaining diacritics stripped.
//! Normalization is total and idempotent.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Digraph substitutions applied before the generic diacritic strip, so that
/// "Köln" becomes "koeln" rather than "koln".
const UMLAUT_MAP: &[(char, &str)] = &[('ä', "ae"), ('ö', "oe"), ('ü', "ue"), ('ß', "ss")];

/// Canonical comparable form of raw user input.
///
/// trim → lowercase → hyphens to spaces → umlaut digraphs → NFKD with
/// combining marks dropped → keep `[a-z0-9 ]` → collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase().replace('-', " ");

    let mut mapped = String::with_capacity(lowered.len());
    'chars: for ch in lowered.chars() {
        for (umlaut, digraph) in UMLAUT_MAP {
            if ch == *umlaut {
                mapped.push_str(digraph);
                continue 'chars;
            }
        }
        mapped.push(ch);
    }

    let cleaned: String = mapped
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == ' ')
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase first character of the normalized text, or `None` if
/// normalization yields the empty string.
pub fn first_letter_upper(text: &str) -> Option<char> {
    normalize(text).chars().next().map(|ch| ch.to_ascii_uppercase())
}

/// Fuzzy similarity in [0, 1] between the normalized forms of `a` and `b`.
///
/// Ratcliff/Obershelp ratio: twice the total length of matching blocks over
/// the combined length. 0.0 if either input normalizes to empty; 1.0 for
/// identical non-empty inputs. Symmetric and deterministic.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    // Normalized text is pure ASCII, so byte indexing is safe here.
    let (xa, xb) = (na.as_bytes(), nb.as_bytes());
    let matches = matching_total(xa, xb);
    2.0 * matches as f64 / (xa.len() + xb.len()) as f64
}

/// Total matched characters: longest common block, then recurse on the
/// pieces left and right of it.
fn matching_total(a: &[u8], b: &[u8]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (ai, bi, size) = longest_match(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_total(&a[..ai], &b[..bi]) + matching_total(&a[ai + size..], &b[bi + size..])
}

/// Longest common substring of `a` and `b` as (start in a, start in b, len).
/// Ties resolve to the earliest position in `a`, then in `b`.
fn longest_match(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    // row[j + 1] = length of the common suffix ending at a[i], b[j]
    let mut row = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut prev = 0usize;
        for (j, &cb) in b.iter().enumerate() {
            let cur = if ca == cb { prev + 1 } else { 0 };
            prev = row[j + 1];
            row[j + 1] = cur;
            if cur > best.2 {
                best = (i + 1 - cur, j + 1 - cur, cur);
            }
        }
    }
    best
}
