//! Name similarity scoring
//!
//! Scores how alike two names are on a 0..=100 scale using a
//! case-insensitive Levenshtein edit distance:
//!
//! ```text
//! similarity = round(100 * (max(m, n) - d) / max(m, n))
//! ```
//!
//! Identical names (ignoring case) and two empty names both score 100.

/// Maximum possible similarity score
pub const MAX_SCORE: u8 = 100;

/// Levenshtein edit distance between two character sequences
fn edit_distance(a: &[char], b: &[char]) -> usize {
    // Single-row DP: prev[j] holds the distance between a[..i-1] and b[..j]
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn fold(s: &str) -> Vec<char> {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Returns the similarity of two names, 0 (unrelated) to 100 (identical)
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = fold(a);
    let b = fold(b);
    if a == b {
        return MAX_SCORE;
    }

    let max_len = a.len().max(b.len());
    let distance = edit_distance(&a, &b);
    let ratio = (max_len - distance) as f64 / max_len as f64;
    (ratio * f64::from(MAX_SCORE)).round() as u8
}
